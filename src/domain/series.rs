// Telemetry series domain models
use chrono::{DateTime, Utc, Weekday};
use serde::Deserialize;

use crate::error::TelemetryError;

/// One motor-current sample. Auxiliary fields (`amps_avg`, `amp_limit`,
/// `runtime_min`) are opaque to the downsampler and carried through
/// verbatim.
#[derive(Debug, Clone)]
pub struct TelemetryPoint {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub amps: f64,
    pub running: bool,
    pub amps_avg: f64,
    pub amp_limit: f64,
    pub runtime_min: i64,
}

impl TelemetryPoint {
    pub fn new(
        id: i64,
        timestamp: DateTime<Utc>,
        amps: f64,
        running: bool,
        amps_avg: f64,
        amp_limit: f64,
        runtime_min: i64,
    ) -> Self {
        Self {
            id,
            timestamp,
            amps,
            running,
            amps_avg,
            amp_limit,
            runtime_min,
        }
    }
}

/// Identity key of a series: every point in a series belongs to exactly
/// one (zone, line, motor). Components are free-form strings from the
/// backing store, treated as opaque identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MotorId {
    pub zone: String,
    pub line: String,
    pub motor: String,
}

impl MotorId {
    pub fn new(zone: String, line: String, motor: String) -> Self {
        Self { zone, line, motor }
    }

    /// All three components must be non-empty, checked before any
    /// backing-store call is issued.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        for (name, value) in [
            ("zone", &self.zone),
            ("line", &self.line),
            ("motor", &self.motor),
        ] {
            if value.trim().is_empty() {
                return Err(TelemetryError::InvalidArgument(format!(
                    "motor identity has an empty {} component",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for MotorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zone, self.line, self.motor)
    }
}

/// Optional filters applied by the backing store when fetching raw rows.
#[derive(Debug, Clone, Default)]
pub struct SeriesFilter {
    /// Production week label, an opaque tag value in the store.
    pub week: Option<String>,
    /// Restrict to samples falling on one day of the week.
    pub day: Option<Weekday>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Which field drives peak/valley selection in the downsampler. The
/// source ranks by raw instantaneous current; some views plot the
/// averaged series instead, so this is a configuration choice rather
/// than a hardcoded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    Amps,
    AmpsAvg,
}

impl RankingMetric {
    pub fn value_of(&self, point: &TelemetryPoint) -> f64 {
        match self {
            RankingMetric::Amps => point.amps,
            RankingMetric::AmpsAvg => point.amps_avg,
        }
    }
}
