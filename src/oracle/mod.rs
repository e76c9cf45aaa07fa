//! Client side of the path oracle.
//!
//! The oracle keeps historical per-path measurements and turns them into
//! scores. Selectors query it for scores, the bandwidth tracer feeds it
//! fresh reports.

mod client;
mod types;

pub use client::OracleClient;
pub use types::{Report, ReportMetadata, ScoredPath, ScoringQuery, ScoringResponse};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Operations offered by the oracle.
#[async_trait]
pub trait OracleApi: Send + Sync {
    /// Fetch scores for the queried destinations.
    async fn fetch_scores(&self, query: &ScoringQuery) -> Result<ScoringResponse>;

    /// Submit one measurement report.
    async fn report_stats(&self, report: &Report) -> Result<()>;
}

/// Oracle client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// `host:port` of the oracle.
    #[serde(default)]
    pub location: String,

    /// Request timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            timeout: default_timeout(),
        }
    }
}

impl OracleConfig {
    pub fn with_location(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.location.is_empty()
    }
}
