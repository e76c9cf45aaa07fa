//! Uniformly random path, frozen after the first pick.

use rand::seq::SliceRandom;
use tracing::debug;

use super::Outcome;
use crate::types::{Path, PathFingerprint, PathInterface};

/// Picks a random candidate at initialization and never switches.
#[derive(Debug, Default)]
pub struct RandomSelector {
    paths: Vec<Path>,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, paths: Vec<Path>) -> Option<&Path> {
        self.paths = paths;
        self.paths.shuffle(&mut rand::thread_rng());
        debug!(
            amount = self.paths.len(),
            best_fp = ?self.paths.first().map(|p| &p.fingerprint),
            "done shuffling paths"
        );
        self.paths.first()
    }

    pub fn path(&self) -> Option<&Path> {
        self.paths.first()
    }

    pub fn candidates(&self) -> &[Path] {
        &self.paths
    }

    /// Ignored: the first pick is kept for the whole connection.
    pub fn refresh(&mut self, paths: &[Path]) -> Outcome {
        debug!(offered = paths.len(), "refresh ignored, selection is frozen");
        Outcome::Unchanged
    }

    /// Ignored: the first pick is kept for the whole connection.
    pub fn path_down(&mut self, fp: &PathFingerprint, pi: &PathInterface) -> Outcome {
        debug!(fingerprint = %fp, interface = %pi, "path down ignored, selection is frozen");
        Outcome::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::test_support::path;

    #[test]
    fn test_initialize_selects_a_candidate() {
        let mut selector = RandomSelector::new();
        let paths = vec![path("a", 1, 0), path("b", 2, 0), path("c", 3, 0)];
        let picked = selector.initialize(paths.clone()).cloned().unwrap();
        assert!(paths.contains(&picked));
        assert_eq!(selector.path(), Some(&picked));
    }

    #[test]
    fn test_frozen_after_first_pick() {
        let mut selector = RandomSelector::new();
        let picked = selector.initialize(vec![path("a", 1, 0), path("b", 2, 10)]).cloned().unwrap();

        assert_eq!(selector.refresh(&[path("z", 1, 50)]), Outcome::Unchanged);
        let pi = picked.metadata.interfaces[0];
        assert_eq!(selector.path_down(&picked.fingerprint, &pi), Outcome::Unchanged);
        assert_eq!(selector.path(), Some(&picked));
    }

    #[test]
    fn test_empty_candidates() {
        let mut selector = RandomSelector::new();
        assert!(selector.initialize(vec![]).is_none());
        assert!(selector.path().is_none());
    }
}
