//! Append-only CSV outputs for measurement windows.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{IntervalStats, LifetimeStats, INTERVAL_CSV_HEADER, LIFETIME_CSV_HEADER};
use crate::error::Result;

/// Destinations of the stats rows. An unset file disables that output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvConfig {
    /// One row per connection.
    #[serde(default)]
    pub summary_file: Option<PathBuf>,

    /// One row per measurement window.
    #[serde(default)]
    pub interval_file: Option<PathBuf>,
}

/// Writes interval and lifetime rows. Disabled outputs are no-ops.
#[derive(Debug, Default)]
pub struct CsvStatsWriter {
    intervals: Option<csv::Writer<File>>,
    summary: Option<csv::Writer<File>>,
}

impl CsvStatsWriter {
    /// Open the configured files for appending. A file that cannot be
    /// opened disables its output instead of failing the connection.
    pub fn open(config: &CsvConfig) -> Self {
        let intervals = config
            .interval_file
            .as_deref()
            .and_then(|path| open_or_warn(path, &INTERVAL_CSV_HEADER));
        let summary = config
            .summary_file
            .as_deref()
            .and_then(|path| open_or_warn(path, &LIFETIME_CSV_HEADER));

        Self { intervals, summary }
    }

    /// A writer that drops every row.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.intervals.is_some() || self.summary.is_some()
    }

    pub fn write_interval(&mut self, stats: &IntervalStats) -> Result<()> {
        if let Some(writer) = self.intervals.as_mut() {
            writer.write_record(stats.csv_record())?;
            writer.flush()?;
        }
        Ok(())
    }

    pub fn write_lifetime(&mut self, stats: &LifetimeStats) -> Result<()> {
        if let Some(writer) = self.summary.as_mut() {
            writer.write_record(stats.csv_record())?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush and release both files.
    pub fn close(&mut self) -> Result<()> {
        for mut writer in [self.intervals.take(), self.summary.take()].into_iter().flatten() {
            writer.flush()?;
        }
        Ok(())
    }
}

fn open_or_warn(path: &Path, header: &[&str]) -> Option<csv::Writer<File>> {
    match open_append(path, header) {
        Ok(writer) => {
            debug!(file = %path.display(), "opened stats file");
            Some(writer)
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "could not open stats file, output disabled");
            None
        }
    }
}

fn open_append(path: &Path, header: &[&str]) -> Result<csv::Writer<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if is_empty {
        writer.write_record(header)?;
        writer.flush()?;
    }
    Ok(writer)
}
