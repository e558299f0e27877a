//! Flight progress estimation.
//!
//! Positions are synthetic: an aircraft is assumed to move along the straight
//! line (in degrees) between its origin and destination at a constant rate
//! over its scheduled block time. Nothing here performs I/O or keeps state
//! between calls.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Schedules shorter than this are stretched to it before dividing.
pub const MIN_DURATION_SECS: i64 = 1;

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Per-axis linear interpolation towards `other`.
    pub fn lerp(self, other: Coord, t: f64) -> Coord {
        Coord {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }
}

/// A scheduled flight as read from the flight store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_id: String,
    pub origin_coord: Coord,
    pub destination_coord: Coord,
    /// Scheduled departure, Unix epoch seconds
    pub departure_time: i64,
    /// Scheduled arrival, Unix epoch seconds
    pub arrival_time: i64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl FlightRecord {
    /// Scheduled block time in hours. Negative for inverted schedules.
    pub fn duration_hours(&self) -> f64 {
        self.arrival_time.saturating_sub(self.departure_time) as f64 / 3600.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FlightPhase {
    Takeoff,
    Climbing,
    Cruising,
    Descending,
    Landing,
}

/// Exclusive upper bound of each phase, checked in order.
const PHASE_TABLE: [(f64, FlightPhase); 5] = [
    (0.1, FlightPhase::Takeoff),
    (0.3, FlightPhase::Climbing),
    (0.7, FlightPhase::Cruising),
    (0.9, FlightPhase::Descending),
    (f64::INFINITY, FlightPhase::Landing),
];

impl FlightPhase {
    pub const ALL: [FlightPhase; 5] = [
        FlightPhase::Takeoff,
        FlightPhase::Climbing,
        FlightPhase::Cruising,
        FlightPhase::Descending,
        FlightPhase::Landing,
    ];

    pub fn from_progress(progress: f64) -> FlightPhase {
        PHASE_TABLE
            .iter()
            .find(|(upper, _)| progress < *upper)
            .map(|(_, phase)| *phase)
            .unwrap_or(FlightPhase::Landing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPhase::Takeoff => "Takeoff",
            FlightPhase::Climbing => "Climbing",
            FlightPhase::Cruising => "Cruising",
            FlightPhase::Descending => "Descending",
            FlightPhase::Landing => "Landing",
        }
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        FlightPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown flight phase '{}'", s))
    }
}

/// Values derived from a [`FlightRecord`] at one evaluation instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFlightState {
    pub progress: f64,
    pub current_coord: Coord,
    /// Unix epoch seconds, may carry a fractional part
    pub eta: f64,
    pub flight_phase: FlightPhase,
}

impl DerivedFlightState {
    /// ETA rounded to the nearest nanosecond.
    pub fn eta_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = self.eta.floor();
        let nanos = ((self.eta - secs) * 1e9).round() as u32;
        if nanos >= 1_000_000_000 {
            DateTime::from_timestamp(secs as i64 + 1, 0)
        } else {
            DateTime::from_timestamp(secs as i64, nanos)
        }
    }
}

/// A record paired with its derived state, as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedFlight {
    #[serde(flatten)]
    pub record: FlightRecord,
    #[serde(flatten)]
    pub state: DerivedFlightState,
}

/// Fraction of the scheduled duration elapsed at `now`, clamped to `[0, 1]`.
pub fn progress(record: &FlightRecord, now: i64) -> f64 {
    let duration = record
        .arrival_time
        .saturating_sub(record.departure_time)
        .max(MIN_DURATION_SECS);
    let elapsed = now.saturating_sub(record.departure_time);
    (elapsed as f64 / duration as f64).clamp(0.0, 1.0)
}

pub fn estimate(record: &FlightRecord, now: i64) -> DerivedFlightState {
    let progress = progress(record, now);
    let current_coord = record
        .origin_coord
        .lerp(record.destination_coord, progress);
    let scheduled = record.arrival_time.saturating_sub(record.departure_time) as f64;
    let eta = record.departure_time as f64 + scheduled * progress;

    DerivedFlightState {
        progress,
        current_coord,
        eta,
        flight_phase: FlightPhase::from_progress(progress),
    }
}

/// Evaluates every record at the same instant. Records are independent so the
/// batch is spread across the rayon pool.
pub fn estimate_batch(records: Vec<FlightRecord>, now: i64) -> Vec<TrackedFlight> {
    records
        .into_par_iter()
        .map(|record| {
            let state = estimate(&record, now);
            TrackedFlight { record, state }
        })
        .collect()
}
