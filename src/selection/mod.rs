//! Path selection for multipath connections.
//!
//! A connection has a set of candidate paths and one of them is active.
//! Five interchangeable policies decide which:
//! - Random: uniform pick, frozen after the first choice
//! - Shortest: fewest hops, frozen after the first choice
//! - Constant: a pinned fingerprint, for controlled experiments
//! - Norm: folded-normal random index over the hop-ranked set
//! - Oracle: highest throughput score reported by the path oracle
//!
//! Selection changes are published over a [`PathPublisher`] so the
//! bandwidth tracer can attribute bytes to the right path.

mod channel;
mod constant;
mod norm;
mod policy;
mod random;
mod selector;
mod shortest;
mod throughput;

pub use channel::{path_channel, PathPublisher, PathSubscriber};
pub use constant::ConstantSelector;
pub use norm::NormSelector;
pub use policy::Policy;
pub use random::RandomSelector;
pub use selector::PathSelector;
pub use shortest::ShortestSelector;
pub use throughput::{ScoreSource, Scores, ThroughputSelector};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Path;

/// Default spread divisor for the norm policy.
pub const DEFAULT_NORM_DIVISOR: f64 = 2.0;

/// Smallest accepted norm divisor. Below it the folded normal is so wide
/// that almost every draw falls outside the candidate set.
pub const MIN_NORM_DIVISOR: f64 = 0.1;

/// Score requested from the oracle when none is configured.
pub const DEFAULT_SCORE_NAME: &str = "throughput";

/// Selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Uniformly random path, kept for the whole connection.
    Random,
    /// Path with the fewest hops, kept for the whole connection.
    #[default]
    Shortest,
    /// Externally pinned path.
    Constant,
    /// Random path biased towards few hops.
    Norm,
    /// Best oracle throughput score.
    Oracle,
}

impl SelectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Shortest => "shortest",
            Self::Constant => "constant",
            Self::Norm => "norm",
            Self::Oracle => "oracle",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(Self::Random),
            "shortest" => Ok(Self::Shortest),
            "constant" => Ok(Self::Constant),
            "norm" => Ok(Self::Norm),
            "oracle" | "throughput" => Ok(Self::Oracle),
            other => Err(Error::InvalidConfig(format!("unknown selector: {other}"))),
        }
    }
}

/// Selector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Selection policy.
    #[serde(default)]
    pub kind: SelectorKind,

    /// Fingerprint the constant policy pins to.
    #[serde(default)]
    pub pinned_fingerprint: Option<String>,

    /// Spread divisor for the norm policy; the draw uses a standard
    /// deviation of `candidates / norm_divisor`.
    #[serde(default = "default_norm_divisor")]
    pub norm_divisor: f64,

    /// How often oracle scores are refetched. Zero fetches only once.
    #[serde(default = "default_fetch_interval", with = "humantime_serde")]
    pub fetch_scores_interval: Duration,

    /// Name of the oracle score to rank by.
    #[serde(default = "default_score_name")]
    pub score_name: String,
}

fn default_norm_divisor() -> f64 { DEFAULT_NORM_DIVISOR }
fn default_fetch_interval() -> Duration { Duration::from_secs(600) }
fn default_score_name() -> String { DEFAULT_SCORE_NAME.into() }

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            kind: SelectorKind::default(),
            pinned_fingerprint: None,
            norm_divisor: default_norm_divisor(),
            fetch_scores_interval: default_fetch_interval(),
            score_name: default_score_name(),
        }
    }
}

impl SelectorConfig {
    /// Convenience constructor for a given policy with default settings.
    pub fn with_kind(kind: SelectorKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Reject settings the chosen policy cannot run with.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            SelectorKind::Constant => match self.pinned_fingerprint.as_deref() {
                Some(fp) if !fp.is_empty() => {}
                _ => {
                    return Err(Error::InvalidConfig(
                        "constant selector requires a pinned fingerprint".into(),
                    ))
                }
            },
            SelectorKind::Norm => {
                if !self.norm_divisor.is_finite() || self.norm_divisor < MIN_NORM_DIVISOR {
                    return Err(Error::InvalidConfig(format!(
                        "norm divisor must be a finite number of at least {MIN_NORM_DIVISOR}, got {}",
                        self.norm_divisor
                    )));
                }
            }
            SelectorKind::Oracle => {
                if self.score_name.is_empty() {
                    return Err(Error::InvalidConfig("oracle selector requires a score name".into()));
                }
            }
            SelectorKind::Random | SelectorKind::Shortest => {}
        }
        Ok(())
    }
}

/// What a policy operation asks the selector to announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The selected fingerprint did not move.
    Unchanged,
    /// A different path (or none) is now selected.
    Changed(Option<Path>),
}

impl Outcome {
    /// Compare the selection before and after an update.
    pub(crate) fn between(before: Option<&Path>, after: Option<&Path>) -> Self {
        match (before, after) {
            (Some(b), Some(a)) if b.fingerprint == a.fingerprint => Self::Unchanged,
            (None, None) => Self::Unchanged,
            (_, after) => Self::Changed(after.cloned()),
        }
    }
}

/// Shuffle, then stable-sort by hop count so equal-length paths end up in
/// random order rather than discovery order.
pub(crate) fn rank_by_hops<R: Rng + ?Sized>(paths: &mut [Path], rng: &mut R) {
    paths.shuffle(rng);
    paths.sort_by_key(Path::hops);
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{IsdAs, Path, PathInterface};

    /// Path whose interfaces are numbered `base..base + hops`.
    pub fn path(fp: &str, hops: u64, base: u64) -> Path {
        let ia = IsdAs::new(1, 0xff00_0000_0110);
        Path::new(fp, (base..base + hops).map(|i| PathInterface::new(ia, i)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_support::path;

    #[test]
    fn test_kind_parse() {
        assert_eq!("norm".parse::<SelectorKind>().unwrap(), SelectorKind::Norm);
        assert_eq!("throughput".parse::<SelectorKind>().unwrap(), SelectorKind::Oracle);
        assert!("ping".parse::<SelectorKind>().is_err());
    }

    #[test]
    fn test_validate_constant_needs_pin() {
        let config = SelectorConfig::with_kind(SelectorKind::Constant);
        assert!(config.validate().is_err());

        let config = SelectorConfig {
            pinned_fingerprint: Some("x".into()),
            ..SelectorConfig::with_kind(SelectorKind::Constant)
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_norm_divisor() {
        for div in [0.0, -1.0, 1e-12, 0.09, f64::NAN, f64::INFINITY] {
            let config = SelectorConfig {
                norm_divisor: div,
                ..SelectorConfig::with_kind(SelectorKind::Norm)
            };
            assert!(config.validate().is_err(), "divisor {div} accepted");
        }
    }

    #[test]
    fn test_outcome_between() {
        let a = path("a", 1, 0);
        let b = path("b", 1, 0);
        assert_eq!(Outcome::between(Some(&a), Some(&a)), Outcome::Unchanged);
        assert_eq!(Outcome::between(None, None), Outcome::Unchanged);
        assert_eq!(Outcome::between(Some(&a), Some(&b)), Outcome::Changed(Some(b.clone())));
        assert_eq!(Outcome::between(Some(&a), None), Outcome::Changed(None));
        assert_eq!(Outcome::between(None, Some(&b)), Outcome::Changed(Some(b)));
    }

    #[test]
    fn test_rank_by_hops_orders_ascending() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut paths = vec![path("c", 3, 0), path("a", 1, 0), path("b", 2, 0), path("d", 1, 10)];
        rank_by_hops(&mut paths, &mut rng);
        let hops: Vec<_> = paths.iter().map(Path::hops).collect();
        assert_eq!(hops, vec![1, 1, 2, 3]);
    }

    #[test]
    fn test_rank_by_hops_breaks_ties_randomly() {
        let mut firsts = std::collections::HashSet::new();
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut paths = vec![path("a", 1, 0), path("b", 1, 10), path("c", 2, 0)];
            rank_by_hops(&mut paths, &mut rng);
            firsts.insert(paths[0].fingerprint.clone());
        }
        assert_eq!(firsts.len(), 2);
    }
}
