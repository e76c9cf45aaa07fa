//! Fewest-hop path, frozen after the first pick.

use tracing::debug;

use super::{rank_by_hops, Outcome};
use crate::types::{Path, PathFingerprint, PathInterface};

/// Ranks candidates by hop count once and keeps the shortest.
#[derive(Debug, Default)]
pub struct ShortestSelector {
    paths: Vec<Path>,
}

impl ShortestSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, paths: Vec<Path>) -> Option<&Path> {
        self.paths = paths;
        rank_by_hops(&mut self.paths, &mut rand::thread_rng());
        debug!(
            amount = self.paths.len(),
            best_fp = ?self.paths.first().map(|p| &p.fingerprint),
            hops_shortest_path = self.paths.first().map_or(0, Path::hops),
            "done ranking paths"
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
