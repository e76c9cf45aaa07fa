//! # pathoracle
//!
//! Path selection and bandwidth telemetry for multipath connections.
//!
//! A transport hands every connection's candidate paths to a
//! [`PathSelector`](selection::PathSelector), which picks the active one
//! according to a configurable policy. Each selection change is published
//! to the connection's [`BandwidthTracer`](telemetry::BandwidthTracer),
//! which labels sent bytes with the path they travelled on and reports
//! the measured throughput back to the path oracle.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Transport Layer                          │
//! ├──────────────────────────────┬──────────────────────────────────┤
//! │        Path Selector         │        Bandwidth Tracer          │
//! │  ┌────────┐ ┌──────────┐     │   ┌──────────┐  ┌───────────┐    │
//! │  │ Random │ │ Shortest │ ... │──►│ Interval │  │ Lifetime  │    │
//! │  └────────┘ └──────────┘     │   └──────────┘  └───────────┘    │
//! ├──────────────────────────────┴───────────────┬──────────────────┤
//! │               Oracle Client (HTTP)           │   CSV Stats Sink │
//! └──────────────────────────────────────────────┴──────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]      // Many functions can't be const due to trait bounds
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]        // AS numbers read better in hex groups
#![allow(clippy::cast_possible_truncation)]  // Index draws from float samples
#![allow(clippy::cast_sign_loss)]            // Folded samples are never negative
#![allow(clippy::cast_precision_loss)]       // Acceptable for stats
#![allow(clippy::significant_drop_tightening)] // Lock ordering is intentional
#![allow(clippy::option_if_let_else)]        // More readable in context
#![allow(clippy::use_self)]                  // Explicit type names in matches
#![allow(clippy::redundant_pub_crate)]       // Explicit visibility
#![allow(clippy::future_not_send)]           // Async internals
#![allow(clippy::match_same_arms)]           // Explicit arm per variant is clearer
#![allow(clippy::return_self_not_must_use)]  // Builder methods don't need must_use

pub mod config;
pub mod error;
pub mod oracle;
pub mod selection;
pub mod telemetry;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::oracle::{OracleApi, OracleClient, OracleConfig};
    pub use crate::selection::{path_channel, PathSelector, SelectorConfig, SelectorKind};
    pub use crate::telemetry::{BandwidthTracer, CsvConfig, CsvStatsWriter, ReportingConfig};
    pub use crate::types::*;
}
