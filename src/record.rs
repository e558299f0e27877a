//! Parsing of raw flight rows into [`FlightRecord`]s.
//!
//! Rows come from the flight store with loosely typed columns: coordinates may
//! be JSON arrays or tuple text such as `"(40.64, -73.78)"`, timestamps may be
//! numbers, numeric strings or RFC 3339 text. Anything that does not resolve to
//! a finite coordinate pair or an epoch second is rejected here so the
//! estimator only ever sees well-typed values.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::estimator::{Coord, FlightRecord};

#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("row {index}: {message}")]
    MalformedRow { index: usize, message: String },

    #[error("flight id is missing or not a string: {0}")]
    MalformedFlightId(String),

    #[error("flight {flight_id}: {field} is not a (latitude, longitude) pair: {value}")]
    MalformedCoord {
        flight_id: String,
        field: &'static str,
        value: String,
    },

    #[error("flight {flight_id}: {field} is not a timestamp: {value}")]
    MalformedTimestamp {
        flight_id: String,
        field: &'static str,
        value: String,
    },
}

/// One row of the `flights` table as it arrives over the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFlightRow {
    pub flight_id: Value,
    pub origin: Value,
    pub destination: Value,
    pub status: String,
    pub departure_time: Value,
    pub arrival_time: Value,
    #[serde(default)]
    pub airline: Option<String>,
    #[serde(default)]
    pub aircraft_type: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl RawFlightRow {
    pub fn parse(self) -> Result<FlightRecord, RecordError> {
        let flight_id = match &self.flight_id {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            other => return Err(RecordError::MalformedFlightId(other.to_string())),
        };

        let origin_coord = parse_coord(&self.origin).ok_or_else(|| RecordError::MalformedCoord {
            flight_id: flight_id.clone(),
            field: "origin",
            value: self.origin.to_string(),
        })?;
        let destination_coord =
            parse_coord(&self.destination).ok_or_else(|| RecordError::MalformedCoord {
                flight_id: flight_id.clone(),
                field: "destination",
                value: self.destination.to_string(),
            })?;

        let departure_time =
            parse_timestamp(&self.departure_time).ok_or_else(|| RecordError::MalformedTimestamp {
                flight_id: flight_id.clone(),
                field: "departure_time",
                value: self.departure_time.to_string(),
            })?;
        let arrival_time =
            parse_timestamp(&self.arrival_time).ok_or_else(|| RecordError::MalformedTimestamp {
                flight_id: flight_id.clone(),
                field: "arrival_time",
                value: self.arrival_time.to_string(),
            })?;

        if arrival_time <= departure_time {
            warn!(
                flight_id = %flight_id,
                departure_time,
                arrival_time,
                "arrival is not after departure, progress will be clamped"
            );
        }

        Ok(FlightRecord {
            flight_id,
            origin_coord,
            destination_coord,
            departure_time,
            arrival_time,
            status: self.status,
            airline: self.airline,
            aircraft_type: self.aircraft_type,
            speed: self.speed,
            altitude: self.altitude,
        })
    }
}

/// Records that parsed, and how many rows were dropped.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedRows {
    pub records: Vec<FlightRecord>,
    pub rejected: usize,
}

/// Parses a single untyped row. `index` only labels the error.
pub fn parse_row(index: usize, row: Value) -> Result<FlightRecord, RecordError> {
    let raw: RawFlightRow =
        serde_json::from_value(row).map_err(|e| RecordError::MalformedRow {
            index,
            message: e.to_string(),
        })?;
    raw.parse()
}

/// Parses rows independently. A malformed row is logged and dropped, the rest
/// are kept.
pub fn parse_rows(rows: Vec<Value>) -> ParsedRows {
    let mut parsed = ParsedRows::default();
    for (index, row) in rows.into_iter().enumerate() {
        match parse_row(index, row) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                warn!(index, error = %e, "rejecting flight row");
                parsed.rejected += 1;
            }
        }
    }
    parsed
}

fn parse_coord(value: &Value) -> Option<Coord> {
    let (lat, lon) = match value {
        Value::Array(items) => match items.as_slice() {
            [lat, lon] => (lat.as_f64()?, lon.as_f64()?),
            _ => return None,
        },
        Value::String(text) => parse_coord_text(text)?,
        _ => return None,
    };

    (lat.is_finite() && lon.is_finite()).then(|| Coord::new(lat, lon))
}

fn parse_coord_text(text: &str) -> Option<(f64, f64)> {
    let text = text.trim();
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .or_else(|| text.strip_prefix('[').and_then(|t| t.strip_suffix(']')))
        .unwrap_or(text);

    let mut parts = inner.split(',').map(str::trim);
    let lat = parts.next()?.parse().ok()?;
    let lon = parts.next()?.parse().ok()?;
    match parts.next() {
        // tolerate a trailing comma, nothing else
        Some("") if parts.next().is_none() => Some((lat, lon)),
        None => Some((lat, lon)),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_secs)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(float_secs))
                .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.timestamp()))
        }
        _ => None,
    }
}

fn float_secs(secs: f64) -> Option<i64> {
    (secs.is_finite() && secs.abs() < i64::MAX as f64).then(|| secs.floor() as i64)
}
