//! Per-connection bandwidth telemetry.
//!
//! A [`BandwidthTracer`] counts the bytes a connection sends, splits them
//! into windows labelled with the path they travelled on, persists every
//! window through a [`CsvStatsWriter`] and reports it to the path oracle.

mod sink;
mod stats;
mod tracer;

pub use sink::{CsvConfig, CsvStatsWriter};
pub use stats::{
    throughput, IntervalStats, LifetimeStats, FINGERPRINT_SEPARATOR, INTERVAL_CSV_HEADER,
    LIFETIME_CSV_HEADER, TIME_FORMAT,
};
pub use tracer::{BandwidthTracer, Submission, TracerPhase, TracerSnapshot};

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// When and how measurement windows are reported to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Close the current window whenever the selected path changes.
    #[serde(default = "default_true")]
    pub report_on_path_change: bool,

    /// Close the current window periodically. Zero disables the timer.
    #[serde(default = "default_reporting_interval", with = "humantime_serde")]
    pub reporting_interval: Duration,

    /// Windows shorter than this are persisted but not reported.
    #[serde(default, with = "humantime_serde")]
    pub min_interval_for_report: Duration,

    /// Application name put into every report.
    #[serde(default = "default_application")]
    pub application: String,

    /// Free-form report metadata.
    #[serde(default = "default_properties")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool { true }
fn default_reporting_interval() -> Duration { Duration::from_secs(300) }
fn default_application() -> String { env!("CARGO_PKG_NAME").into() }

fn default_properties() -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([
        ("protocols".to_string(), serde_json::json!(["SCION", "UDP", "QUIC"])),
        ("taps-capacity-profile".to_string(), serde_json::json!("capacity-seeking")),
    ])
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            report_on_path_change: default_true(),
            reporting_interval: default_reporting_interval(),
            min_interval_for_report: Duration::ZERO,
            application: default_application(),
            properties: default_properties(),
        }
    }
}

impl ReportingConfig {
    pub fn continuous_reporting(&self) -> bool {
        !self.reporting_interval.is_zero()
    }
}
