use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::record::{ParsedRows, parse_rows};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where flight rows are read from. Each fetch goes back to the source.
#[derive(Debug, Clone)]
pub enum FlightSource {
    /// A JSON array of rows on disk
    File(PathBuf),
    /// An endpoint returning a JSON array of rows
    Http { url: String, client: reqwest::Client },
}

impl FlightSource {
    pub fn from_location(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            FlightSource::Http {
                url: location.to_string(),
                client: reqwest::Client::new(),
            }
        } else {
            FlightSource::File(PathBuf::from(location))
        }
    }

    /// Rows stay untyped so one bad row cannot fail the whole document.
    pub async fn fetch_rows(&self) -> Result<Vec<Value>, SourceError> {
        match self {
            FlightSource::File(path) => {
                info!("Reading flights from {}", path.display());
                let bytes = tokio::fs::read(path).await?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            FlightSource::Http { url, client } => {
                info!("Fetching flights from {}", url);
                let rows = client
                    .get(url)
                    .header("User-Agent", "SkyVision/0.1.0")
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                Ok(rows)
            }
        }
    }

    /// Fetches and parses all rows, newest departure first. Malformed rows are
    /// dropped and counted.
    pub async fn fetch(&self) -> Result<ParsedRows, SourceError> {
        let rows = self.fetch_rows().await?;
        let mut parsed = parse_rows(rows);
        parsed
            .records
            .sort_by(|a, b| b.departure_time.cmp(&a.departure_time));
        info!(
            "Loaded {} flights, rejected {} rows",
            parsed.records.len(),
            parsed.rejected
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_flights(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flights.json");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_from_location() {
        assert!(matches!(
            FlightSource::from_location("https://example.com/flights"),
            FlightSource::Http { .. }
        ));
        assert!(matches!(
            FlightSource::from_location("data/flights.json"),
            FlightSource::File(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_from_file_sorted_by_departure() {
        let (_dir, path) = write_flights(
            r#"[
                {"flight_id": "OLD", "origin": "(0, 0)", "destination": "(1, 1)",
                 "status": "Landed", "departure_time": 100, "arrival_time": 200},
                {"flight_id": "NEW", "origin": [2, 2], "destination": [3, 3],
                 "status": "Boarding", "departure_time": 500, "arrival_time": 900}
            ]"#,
        );

        let parsed = FlightSource::File(path).fetch().await.unwrap();
        assert_eq!(parsed.rejected, 0);
        let ids: Vec<_> = parsed.records.iter().map(|r| r.flight_id.as_str()).collect();
        assert_eq!(ids, vec!["NEW", "OLD"]);
    }

    #[tokio::test]
    async fn test_fetch_drops_only_bad_rows() {
        let (_dir, path) = write_flights(
            r#"[{"flight_id": "GOOD", "origin": [0, 0], "destination": [1, 1],
                 "status": "On Time", "departure_time": 0, "arrival_time": 10},
                {"flight_id": "BAD", "origin": [0], "destination": [1, 1],
                 "status": "On Time", "departure_time": 0, "arrival_time": 10},
                {"flight_id": "NULLSTATUS", "origin": [0, 0], "destination": [1, 1],
                 "status": null, "departure_time": 0, "arrival_time": 10}]"#,
        );

        let parsed = FlightSource::File(path).fetch().await.unwrap();
        assert_eq!(parsed.rejected, 2);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].flight_id, "GOOD");
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let source = FlightSource::File(PathBuf::from("/nonexistent/flights.json"));
        assert!(matches!(source.fetch().await, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn test_fetch_invalid_json() {
        let (_dir, path) = write_flights("{not json");
        assert!(matches!(
            FlightSource::File(path).fetch().await,
            Err(SourceError::Json(_))
        ));
    }
}
