//! Closed set of selection policies behind one interface.

use super::{
    ConstantSelector, NormSelector, Outcome, RandomSelector, Scores, SelectorConfig, SelectorKind,
    ShortestSelector, ThroughputSelector,
};
use crate::error::{Error, Result};
use crate::types::{Path, PathFingerprint, PathInterface};

/// A selection policy together with its candidate set.
#[derive(Debug)]
pub enum Policy {
    Random(RandomSelector),
    Shortest(ShortestSelector),
    Constant(ConstantSelector),
    Norm(NormSelector),
    Throughput(ThroughputSelector),
}

impl Policy {
    /// Build the policy described by a validated configuration.
    pub fn from_config(config: &SelectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config.kind {
            SelectorKind::Random => Self::Random(RandomSelector::new()),
            SelectorKind::Shortest => Self::Shortest(ShortestSelector::new()),
            SelectorKind::Constant => {
                let pinned = config
                    .pinned_fingerprint
                    .clone()
                    .ok_or_else(|| Error::InvalidConfig("missing pinned fingerprint".into()))?;
                Self::Constant(ConstantSelector::new(pinned))
            }
            SelectorKind::Norm => Self::Norm(NormSelector::new(config.norm_divisor)),
            SelectorKind::Oracle => Self::Throughput(ThroughputSelector::new()),
        })
    }

    pub fn kind(&self) -> SelectorKind {
        match self {
            Self::Random(_) => SelectorKind::Random,
            Self::Shortest(_) => SelectorKind::Shortest,
            Self::Constant(_) => SelectorKind::Constant,
            Self::Norm(_) => SelectorKind::Norm,
            Self::Throughput(_) => SelectorKind::Oracle,
        }
    }

    /// Install the first candidate set and return the initial pick.
    pub fn initialize(&mut self, paths: Vec<Path>) -> Result<Option<Path>> {
        let picked = match self {
            Self::Random(s) => s.initialize(paths),
            Self::Shortest(s) => s.initialize(paths),
            Self::Constant(s) => s.initialize(paths)?,
            Self::Norm(s) => s.initialize(paths)?,
            Self::Throughput(s) => s.initialize(paths),
        };
        Ok(picked.cloned())
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Random(s) => s.path(),
            Self::Shortest(s) => s.path(),
            Self::Constant(s) => s.path(),
            Self::Norm(s) => s.path(),
            Self::Throughput(s) => s.path(),
        }
    }

    pub fn candidates(&self) -> &[Path] {
        match self {
            Self::Random(s) => s.candidates(),
            Self::Shortest(s) => s.candidates(),
            Self::Constant(s) => s.candidates(),
            Self::Norm(s) => s.candidates(),
            Self::Throughput(s) => s.candidates(),
        }
    }

    pub fn refresh(&mut self, paths: Vec<Path>) -> Result<Outcome> {
        match self {
            Self::Random(s) => Ok(s.refresh(&paths)),
            Self::Shortest(s) => Ok(s.refresh(&paths)),
            Self::Constant(s) => s.refresh(paths),
            Self::Norm(s) => s.refresh(paths),
            Self::Throughput(s) => Ok(s.refresh(paths)),
        }
    }

    pub fn path_down(&mut self, fp: &PathFingerprint, pi: &PathInterface) -> Result<Outcome> {
        match self {
            Self::Random(s) => Ok(s.path_down(fp, pi)),
            Self::Shortest(s) => Ok(s.path_down(fp, pi)),
            Self::Constant(s) => s.path_down(fp, pi),
            Self::Norm(s) => s.path_down(fp, pi),
            Self::Throughput(s) => Ok(s.path_down(fp, pi)),
        }
    }

    /// Feed fresh oracle scores. Only the throughput policy uses them.
    pub fn rescore(&mut self, scores: Scores) -> Outcome {
        match self {
            Self::Throughput(s) => s.rescore(scores),
            Self::Random(_) | Self::Shortest(_) | Self::Constant(_) | Self::Norm(_) => {
                Outcome::Unchanged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::test_support::path;

    #[test]
    fn test_from_config_matches_kind() {
        for kind in [
            SelectorKind::Random,
            SelectorKind::Shortest,
            SelectorKind::Norm,
            SelectorKind::Oracle,
        ] {
            let policy = Policy::from_config(&SelectorConfig::with_kind(kind)).unwrap();
            assert_eq!(policy.kind(), kind);
        }

        let config = SelectorConfig {
            pinned_fingerprint: Some("x".into()),
            ..SelectorConfig::with_kind(SelectorKind::Constant)
        };
        assert_eq!(Policy::from_config(&config).unwrap().kind(), SelectorKind::Constant);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Policy::from_config(&SelectorConfig::with_kind(SelectorKind::Constant)).is_err());
    }

    #[test]
    fn test_every_policy_tolerates_empty_set() {
        for kind in [
            SelectorKind::Random,
            SelectorKind::Shortest,
            SelectorKind::Norm,
            SelectorKind::Oracle,
        ] {
            let mut policy = Policy::from_config(&SelectorConfig::with_kind(kind)).unwrap();
            assert!(policy.initialize(vec![]).unwrap().is_none(), "{kind}");
            assert!(policy.path().is_none());
            policy.path_down(&"a".into(), &PathInterface::default()).unwrap();
            assert!(policy.path().is_none());
        }
    }

    #[test]
    fn test_selection_is_a_candidate() {
        for kind in [
            SelectorKind::Random,
            SelectorKind::Shortest,
            SelectorKind::Norm,
            SelectorKind::Oracle,
        ] {
            let mut policy = Policy::from_config(&SelectorConfig::with_kind(kind)).unwrap();
            policy
                .initialize(vec![path("a", 1, 0), path("b", 2, 10), path("c", 3, 20)])
                .unwrap();
            let selected = policy.path().unwrap();
            assert!(policy.candidates().contains(selected), "{kind}");
        }
    }

    #[test]
    fn test_rescore_ignored_by_other_policies() {
        let mut policy = Policy::from_config(&SelectorConfig::with_kind(SelectorKind::Shortest)).unwrap();
        policy.initialize(vec![path("a", 1, 0)]).unwrap();
        let scores = Scores::from([(PathFingerprint::new("a"), 1.0)]);
        assert_eq!(policy.rescore(scores), Outcome::Unchanged);
    }
}
