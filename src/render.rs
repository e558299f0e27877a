use std::fmt::Write as _;

use thiserror::Error;
use tiny_skia::Pixmap;
use usvg::Tree;

use crate::dashboard::{
    STATUS_BOARDING, STATUS_CANCELLED, STATUS_DELAYED, STATUS_IN_FLIGHT, STATUS_LANDED,
    STATUS_ON_TIME,
};
use crate::estimator::{Coord, TrackedFlight};

const WIDTH: f64 = 1600.0;
const HEIGHT: f64 = 800.0;
const DEFAULT_COLOR: &str = "#5352ed";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("SVG error: {0}")]
    Svg(#[from] usvg::Error),

    #[error("cannot allocate {0}x{1} pixmap")]
    Pixmap(u32, u32),

    #[error("PNG encoding error: {0}")]
    Png(String),
}

pub fn status_color(status: &str) -> &'static str {
    match status {
        STATUS_ON_TIME => "#00b09b",
        STATUS_DELAYED => "#ff9a00",
        STATUS_CANCELLED => "#ff4757",
        STATUS_IN_FLIGHT => "#5352ed",
        STATUS_BOARDING => "#3742fa",
        STATUS_LANDED => "#2ed573",
        _ => DEFAULT_COLOR,
    }
}

/// Equirectangular projection onto the canvas.
fn project(coord: Coord) -> (f64, f64) {
    let x = (coord.lon + 180.0) / 360.0 * WIDTH;
    let y = (90.0 - coord.lat) / 180.0 * HEIGHT;
    (x, y)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn graticule() -> String {
    let mut lines = String::new();
    for lon in (-150..=150).step_by(30) {
        let (x, _) = project(Coord::new(0.0, lon as f64));
        let _ = write!(
            lines,
            "<line x1='{x:.1}' y1='0' x2='{x:.1}' y2='{HEIGHT}' stroke='#2c3e50' stroke-width='1' />"
        );
    }
    for lat in (-60..=60).step_by(30) {
        let (_, y) = project(Coord::new(lat as f64, 0.0));
        let _ = write!(
            lines,
            "<line x1='0' y1='{y:.1}' x2='{WIDTH}' y2='{y:.1}' stroke='#2c3e50' stroke-width='1' />"
        );
    }
    lines
}

fn render_flight(flight: &TrackedFlight) -> String {
    let record = &flight.record;
    let state = &flight.state;
    let color = status_color(&record.status);

    let (x1, y1) = project(record.origin_coord);
    let (x2, y2) = project(record.destination_coord);
    let (cx, cy) = project(state.current_coord);

    let dash = if record.status == STATUS_DELAYED {
        " stroke-dasharray='10,5'"
    } else {
        ""
    };

    let id = escape(&record.flight_id);
    let eta = state
        .eta_datetime()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let title = format!(
        "{} • {} • {} • {:.1}% • ETA {}",
        id,
        escape(&record.status),
        state.flight_phase,
        state.progress * 100.0,
        eta
    );

    format!(
        r#"
  <g>
    <line x1='{x1:.1}' y1='{y1:.1}' x2='{x2:.1}' y2='{y2:.1}' stroke='{color}' stroke-width='3' stroke-opacity='0.8'{dash} />
    <circle cx='{cx:.1}' cy='{cy:.1}' r='8' fill='{color}' stroke='white' stroke-width='3'><title>{title}</title></circle>
    <text x='{tx:.1}' y='{ty:.1}' font-family='sans-serif' font-size='14' fill='#ecf0f1'>{id}</text>
  </g>"#,
        tx = cx + 12.0,
        ty = cy - 12.0,
    )
}

/// Draws every flight's route and its current estimated position.
pub fn render_map_svg(flights: &[TrackedFlight]) -> String {
    if flights.is_empty() {
        return render_no_flight_svg();
    }

    let grid = graticule();
    let body: String = flights.iter().map(render_flight).collect();
    let count = flights.len();

    format!(
        r#"<svg width='{WIDTH}' height='{HEIGHT}' viewBox='0 0 {WIDTH} {HEIGHT}' xmlns='http://www.w3.org/2000/svg'>
  <rect width='{WIDTH}' height='{HEIGHT}' fill='#1a1a2e' />
  {grid}
{body}
  <rect x='20' y='20' width='360' height='60' rx='16' fill='#2c3e50' fill-opacity='0.8' />
  <text x='40' y='60' font-family='sans-serif' font-size='28' fill='#ffffff' font-weight='bold'>{count} flights tracked</text>
</svg>"#
    )
}

pub fn svg_to_png(svg: &str, opt: &usvg::Options) -> Result<Vec<u8>, RenderError> {
    let tree = Tree::from_str(svg, opt)?;

    let size = tree.size();
    let (width, height) = (size.width() as u32, size.height() as u32);
    let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Pixmap(width, height))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap.encode_png().map_err(|e| RenderError::Png(e.to_string()))
}

fn render_no_flight_svg() -> String {
    format!(
        r#"<svg width='{WIDTH}' height='{HEIGHT}' viewBox='0 0 {WIDTH} {HEIGHT}' xmlns='http://www.w3.org/2000/svg'>

  <rect width='{WIDTH}' height='{HEIGHT}' fill='#1a1a2e' />

  <text x='800' y='400' font-family='sans-serif' font-size='80' text-anchor='middle' fill='#7f8c8d'>No flights tracked</text>

</svg>"#
    )
}
