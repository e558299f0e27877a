//! Filtering and aggregate figures over tracked flights.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike};
use serde::Serialize;

use crate::estimator::{FlightPhase, TrackedFlight};

pub const STATUS_ON_TIME: &str = "On Time";
pub const STATUS_DELAYED: &str = "Delayed";
pub const STATUS_CANCELLED: &str = "Cancelled";
pub const STATUS_IN_FLIGHT: &str = "In Flight";
pub const STATUS_BOARDING: &str = "Boarding";
pub const STATUS_LANDED: &str = "Landed";

/// Selects flights by status, phase and progress. Empty status or phase lists
/// match everything.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightFilter {
    pub statuses: Vec<String>,
    pub phases: Vec<FlightPhase>,
    pub min_progress: f64,
    pub max_progress: f64,
}

impl Default for FlightFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            phases: Vec::new(),
            min_progress: 0.0,
            max_progress: 1.0,
        }
    }
}

impl FlightFilter {
    pub fn matches(&self, flight: &TrackedFlight) -> bool {
        (self.statuses.is_empty() || self.statuses.iter().any(|s| *s == flight.record.status))
            && (self.phases.is_empty() || self.phases.contains(&flight.state.flight_phase))
            && flight.state.progress >= self.min_progress
            && flight.state.progress <= self.max_progress
    }

    pub fn apply(&self, mut flights: Vec<TrackedFlight>) -> Vec<TrackedFlight> {
        flights.retain(|f| self.matches(f));
        flights
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Flights after filtering
    pub total: usize,
    /// Flights in the batch before filtering
    pub unfiltered_total: usize,
    /// Source rows dropped as malformed
    pub rejected_rows: usize,
    pub on_time: usize,
    pub delayed: usize,
    pub cancelled: usize,
    pub in_flight: usize,
    /// Percent of flights with status "On Time"
    pub on_time_rate: f64,
    /// Percent of flights with status "Delayed"
    pub delay_rate: f64,
    pub avg_duration_hours: Option<f64>,
    /// Highest reported altitude, `None` when no flight reports one
    pub max_altitude: Option<f64>,
    pub by_status: BTreeMap<String, usize>,
    pub by_phase: BTreeMap<FlightPhase, usize>,
    /// UTC hour of scheduled departure
    pub by_departure_hour: BTreeMap<u32, usize>,
    /// Departure hour, then phase
    pub by_hour_and_phase: BTreeMap<u32, BTreeMap<FlightPhase, usize>>,
    /// UTC departure date (`YYYY-MM-DD`), then status
    pub by_date_and_status: BTreeMap<String, BTreeMap<String, usize>>,
}

impl Summary {
    pub fn from_flights(flights: &[TrackedFlight]) -> Self {
        let total = flights.len();

        let mut by_status = BTreeMap::new();
        let mut by_phase: BTreeMap<FlightPhase, usize> =
            FlightPhase::ALL.into_iter().map(|p| (p, 0)).collect();
        let mut by_departure_hour = BTreeMap::new();
        let mut by_hour_and_phase: BTreeMap<u32, BTreeMap<FlightPhase, usize>> = BTreeMap::new();
        let mut by_date_and_status: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        let mut max_altitude: Option<f64> = None;

        for flight in flights {
            let status = &flight.record.status;
            let phase = flight.state.flight_phase;
            *by_status.entry(status.clone()).or_insert(0) += 1;
            *by_phase.entry(phase).or_insert(0) += 1;

            if let Some(dt) = DateTime::from_timestamp(flight.record.departure_time, 0) {
                *by_departure_hour.entry(dt.hour()).or_insert(0) += 1;
                *by_hour_and_phase
                    .entry(dt.hour())
                    .or_default()
                    .entry(phase)
                    .or_insert(0) += 1;
                *by_date_and_status
                    .entry(dt.format("%Y-%m-%d").to_string())
                    .or_default()
                    .entry(status.clone())
                    .or_insert(0) += 1;
            }

            if let Some(altitude) = flight.record.altitude.filter(|a| a.is_finite()) {
                max_altitude = Some(max_altitude.map_or(altitude, |m| m.max(altitude)));
            }
        }

        let count = |status: &str| by_status.get(status).copied().unwrap_or(0);
        let on_time = count(STATUS_ON_TIME);
        let delayed = count(STATUS_DELAYED);
        let cancelled = count(STATUS_CANCELLED);
        let in_flight = count(STATUS_IN_FLIGHT);

        let rate = |n: usize| {
            if total == 0 {
                0.0
            } else {
                n as f64 / total as f64 * 100.0
            }
        };

        let avg_duration_hours = (total > 0).then(|| {
            flights.iter().map(|f| f.record.duration_hours()).sum::<f64>() / total as f64
        });

        Summary {
            total,
            unfiltered_total: total,
            rejected_rows: 0,
            on_time,
            delayed,
            cancelled,
            in_flight,
            on_time_rate: rate(on_time),
            delay_rate: rate(delayed),
            avg_duration_hours,
            max_altitude,
            by_status,
            by_phase,
            by_departure_hour,
            by_hour_and_phase,
            by_date_and_status,
        }
    }

    /// Records how large the batch was before filtering and how many source
    /// rows were dropped.
    pub fn with_batch_counts(mut self, unfiltered_total: usize, rejected_rows: usize) -> Self {
        self.unfiltered_total = unfiltered_total;
        self.rejected_rows = rejected_rows;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{Coord, FlightRecord, estimate_batch};

    fn record(id: &str, status: &str, departure_time: i64, arrival_time: i64) -> FlightRecord {
        FlightRecord {
            flight_id: id.to_string(),
            origin_coord: Coord::new(0.0, 0.0),
            destination_coord: Coord::new(10.0, 10.0),
            departure_time,
            arrival_time,
            status: status.to_string(),
            airline: None,
            aircraft_type: None,
            speed: None,
            altitude: None,
        }
    }

    // evaluated at now = 10_000
    fn flights() -> Vec<TrackedFlight> {
        let mut tracked = estimate_batch(
            vec![
                record("A", STATUS_ON_TIME, 9_000, 19_000),  // 0.1 climbing
                record("B", STATUS_DELAYED, 5_000, 15_000),  // 0.5 cruising
                record("C", STATUS_ON_TIME, 3_600, 7_200),   // 1.0 landing
                record("D", STATUS_IN_FLIGHT, 20_000, 27_200), // 0.0 takeoff
            ],
            10_000,
        );
        tracked.sort_by(|a, b| a.record.flight_id.cmp(&b.record.flight_id));
        tracked
    }

    fn ids(flights: &[TrackedFlight]) -> Vec<&str> {
        flights.iter().map(|f| f.record.flight_id.as_str()).collect()
    }

    #[test]
    fn test_default_filter_matches_all() {
        let all = flights();
        assert_eq!(FlightFilter::default().apply(all.clone()), all);
    }

    #[test]
    fn test_filter_by_status_and_phase() {
        let filter = FlightFilter {
            statuses: vec![STATUS_ON_TIME.to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(flights())), vec!["A", "C"]);

        let filter = FlightFilter {
            statuses: vec![STATUS_ON_TIME.to_string()],
            phases: vec![FlightPhase::Landing],
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(flights())), vec!["C"]);
    }

    #[test]
    fn test_filter_progress_range_is_inclusive() {
        let filter = FlightFilter {
            min_progress: 0.1,
            max_progress: 0.5,
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(flights())), vec!["A", "B"]);
    }

    #[test]
    fn test_summary() {
        let summary = Summary::from_flights(&flights());

        assert_eq!(summary.total, 4);
        assert_eq!(summary.on_time, 2);
        assert_eq!(summary.delayed, 1);
        assert_eq!(summary.cancelled, 0);
        assert_eq!(summary.in_flight, 1);
        assert_eq!(summary.on_time_rate, 50.0);
        assert_eq!(summary.delay_rate, 25.0);
        // 10000s, 10000s, 3600s, 7200s
        let expected = (10_000.0 + 10_000.0 + 3_600.0 + 7_200.0) / 3600.0 / 4.0;
        assert!((summary.avg_duration_hours.unwrap() - expected).abs() < 1e-9);

        assert_eq!(summary.by_phase[&FlightPhase::Takeoff], 1);
        assert_eq!(summary.by_phase[&FlightPhase::Climbing], 1);
        assert_eq!(summary.by_phase[&FlightPhase::Cruising], 1);
        assert_eq!(summary.by_phase[&FlightPhase::Descending], 0);
        assert_eq!(summary.by_phase[&FlightPhase::Landing], 1);

        // departures at 02:30, 01:23, 01:00, 05:33 UTC on 1970-01-01
        assert_eq!(summary.by_departure_hour[&1], 2);
        assert_eq!(summary.by_departure_hour[&2], 1);
        assert_eq!(summary.by_departure_hour[&5], 1);
    }

    #[test]
    fn test_summary_breakdowns() {
        let mut records = vec![
            record("A", STATUS_ON_TIME, 9_000, 19_000),
            record("B", STATUS_DELAYED, 5_000, 15_000),
            record("C", STATUS_ON_TIME, 3_600, 7_200),
            record("D", STATUS_IN_FLIGHT, 20_000, 27_200),
            // 1970-01-02 01:00 UTC
            record("E", STATUS_CANCELLED, 90_000, 100_000),
        ];
        records[0].altitude = Some(35_000.0);
        records[2].altitude = Some(12_000.5);
        records[3].altitude = Some(f64::NAN);

        let summary = Summary::from_flights(&estimate_batch(records, 10_000));
        assert_eq!(summary.max_altitude, Some(35_000.0));

        let hour1 = &summary.by_hour_and_phase[&1];
        assert_eq!(hour1[&FlightPhase::Cruising], 1);
        assert_eq!(hour1[&FlightPhase::Landing], 1);
        assert_eq!(hour1[&FlightPhase::Takeoff], 1);
        assert_eq!(hour1.len(), 3);
        assert_eq!(summary.by_hour_and_phase[&2][&FlightPhase::Climbing], 1);
        assert_eq!(summary.by_hour_and_phase[&5][&FlightPhase::Takeoff], 1);

        let day1 = &summary.by_date_and_status["1970-01-01"];
        assert_eq!(day1[STATUS_ON_TIME], 2);
        assert_eq!(day1[STATUS_DELAYED], 1);
        assert_eq!(day1[STATUS_IN_FLIGHT], 1);
        assert_eq!(summary.by_date_and_status["1970-01-02"][STATUS_CANCELLED], 1);
        assert_eq!(summary.by_date_and_status.len(), 2);
    }

    #[test]
    fn test_batch_counts() {
        let summary = Summary::from_flights(&flights());
        assert_eq!(summary.unfiltered_total, 4);
        assert_eq!(summary.rejected_rows, 0);

        let filtered = FlightFilter {
            phases: vec![FlightPhase::Landing],
            ..Default::default()
        }
        .apply(flights());
        let summary = Summary::from_flights(&filtered).with_batch_counts(4, 2);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.unfiltered_total, 4);
        assert_eq!(summary.rejected_rows, 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::from_flights(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.on_time_rate, 0.0);
        assert_eq!(summary.avg_duration_hours, None);
        assert_eq!(summary.max_altitude, None);
        assert!(summary.by_hour_and_phase.is_empty());
        assert!(summary.by_date_and_status.is_empty());
        assert_eq!(summary.by_phase.len(), 5);
        assert!(summary.by_status.is_empty());
    }

    #[test]
    fn test_summary_json() {
        let json = serde_json::to_value(Summary::from_flights(&flights())).unwrap();
        assert_eq!(json["by_phase"]["Cruising"], 1);
        assert_eq!(json["by_status"]["On Time"], 2);
        assert_eq!(json["by_departure_hour"]["1"], 2);
        assert_eq!(json["by_hour_and_phase"]["2"]["Climbing"], 1);
        assert_eq!(json["by_date_and_status"]["1970-01-01"]["Delayed"], 1);
        assert_eq!(json["max_altitude"], serde_json::Value::Null);
    }
}
