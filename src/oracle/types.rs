//! Wire types of the path oracle's HTTP API.
//!
//! Field names follow the oracle's JSON encoding, not Rust conventions.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{IsdAs, PathFingerprint};

/// Request for named scores of all known paths towards some destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringQuery {
    #[serde(rename = "Queries")]
    pub queries: HashMap<IsdAs, Vec<String>>,
}

impl ScoringQuery {
    /// Query a single score for a single destination.
    pub fn single(destination: IsdAs, score: impl Into<String>) -> Self {
        let mut queries = HashMap::new();
        queries.insert(destination, vec![score.into()]);
        Self { queries }
    }
}

/// Scores the oracle holds for one path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredPath {
    #[serde(rename = "Fingerprint")]
    pub fingerprint: PathFingerprint,
    #[serde(rename = "Scores", default)]
    pub scores: HashMap<String, f64>,
}

/// Scored paths per destination.
pub type ScoringResponse = HashMap<IsdAs, Vec<ScoredPath>>;

/// Context describing how a measurement was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    #[serde(rename = "Application")]
    pub application: String,
    /// Length of the measured window in seconds.
    #[serde(rename = "Duration")]
    pub duration: f64,
    #[serde(rename = "Properties", default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// One measurement of one path, submitted to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "Metadata")]
    pub metadata: ReportMetadata,
    /// Named numeric measurements, e.g. `throughput` in bytes per second.
    #[serde(rename = "Properties")]
    pub properties: BTreeMap<String, f64>,
    #[serde(rename = "SrcIA")]
    pub src_ia: IsdAs,
    #[serde(rename = "DstIA")]
    pub dst_ia: IsdAs,
    #[serde(rename = "PathFp")]
    pub path_fp: PathFingerprint,
}
