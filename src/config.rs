use std::net::{IpAddr, SocketAddr};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "skyvision",
    about = "Serve live flight progress estimates, summaries and route maps over HTTP."
)]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Flight rows: a JSON file path or an http(s) URL
    #[arg(long = "flights", env = "FLIGHTS_SOURCE", default_value = "data/flights.json")]
    pub flights: String,
}

impl Args {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
