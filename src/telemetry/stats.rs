//! Measurement windows and their tabular/report forms.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local};

use super::ReportingConfig;
use crate::oracle::{Report, ReportMetadata};
use crate::types::{IsdAs, PathFingerprint};

/// Timestamp format of the CSV rows.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Separator between fingerprints in the lifetime row.
pub const FINGERPRINT_SEPARATOR: &str = " - ";

pub const INTERVAL_CSV_HEADER: [&str; 7] = [
    "begin",
    "end",
    "begin_unix",
    "end_unix",
    "fingerprint",
    "bytes_sent",
    "throughput",
];

pub const LIFETIME_CSV_HEADER: [&str; 7] = [
    "begin",
    "end",
    "begin_unix",
    "end_unix",
    "fingerprints",
    "bytes_sent",
    "throughput",
];

/// Bytes per second over a window; `None` for an empty window.
pub fn throughput(bytes: u64, duration: Duration) -> Option<f64> {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        Some(bytes as f64 / secs)
    } else {
        None
    }
}

fn elapsed(begin: DateTime<Local>, end: Option<DateTime<Local>>) -> Duration {
    end.and_then(|end| (end - begin).to_std().ok())
        .unwrap_or(Duration::ZERO)
}

fn format_throughput(value: Option<f64>) -> String {
    value.map(|t| format!("{t:.0}")).unwrap_or_default()
}

/// One measurement window. `end` is unset while the window is open.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalStats {
    pub begin: DateTime<Local>,
    pub end: Option<DateTime<Local>>,
    pub bytes_sent: u64,
    /// Path the bytes were sent on; `None` before the first selection.
    pub fingerprint: Option<PathFingerprint>,
}

impl IntervalStats {
    pub fn open(begin: DateTime<Local>, fingerprint: Option<PathFingerprint>) -> Self {
        Self {
            begin,
            end: None,
            bytes_sent: 0,
            fingerprint,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }

    /// Window length; zero while open.
    pub fn duration(&self) -> Duration {
        elapsed(self.begin, self.end)
    }

    pub fn throughput(&self) -> Option<f64> {
        throughput(self.bytes_sent, self.duration())
    }

    pub fn csv_record(&self) -> [String; 7] {
        let end = self.end.unwrap_or(self.begin);
        [
            self.begin.format(TIME_FORMAT).to_string(),
            end.format(TIME_FORMAT).to_string(),
            self.begin.timestamp().to_string(),
            end.timestamp().to_string(),
            self.fingerprint.as_ref().map(ToString::to_string).unwrap_or_default(),
            self.bytes_sent.to_string(),
            format_throughput(self.throughput()),
        ]
    }

    /// Build the oracle report for a closed window that carries a path.
    pub fn to_report(&self, config: &ReportingConfig, src_ia: IsdAs, dst_ia: IsdAs) -> Option<Report> {
        let path_fp = self.fingerprint.clone()?;
        let throughput = self.throughput()?;

        Some(Report {
            metadata: ReportMetadata {
                application: config.application.clone(),
                duration: self.duration().as_secs_f64(),
                properties: config.properties.clone(),
            },
            properties: BTreeMap::from([("throughput".to_string(), throughput)]),
            src_ia,
            dst_ia,
            path_fp,
        })
    }
}

/// Connection-wide totals, finalized once at close.
#[derive(Debug, Clone, PartialEq)]
pub struct LifetimeStats {
    pub begin: DateTime<Local>,
    pub end: Option<DateTime<Local>>,
    pub bytes_sent: u64,
    /// Every path the connection was moved to, in order.
    pub fingerprints: Vec<PathFingerprint>,
    pub path_changes: u32,
}

impl LifetimeStats {
    pub fn open(begin: DateTime<Local>) -> Self {
        Self {
            begin,
            end: None,
            bytes_sent: 0,
            fingerprints: Vec::new(),
            path_changes: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        elapsed(self.begin, self.end)
    }

    pub fn throughput(&self) -> Option<f64> {
        throughput(self.bytes_sent, self.duration())
    }

    pub fn joined_fingerprints(&self) -> String {
        self.fingerprints
            .iter()
            .map(PathFingerprint::as_str)
            .collect::<Vec<_>>()
            .join(FINGERPRINT_SEPARATOR)
    }

    pub fn csv_record(&self) -> [String; 7] {
        let end = self.end.unwrap_or(self.begin);
        [
            self.begin.format(TIME_FORMAT).to_string(),
            end.format(TIME_FORMAT).to_string(),
            self.begin.timestamp().to_string(),
            end.timestamp().to_string(),
            self.joined_fingerprints(),
            self.bytes_sent.to_string(),
            format_throughput(self.throughput()),
        ]
    }
}
