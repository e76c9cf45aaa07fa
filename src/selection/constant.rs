//! Pinned path for controlled experiments.
//!
//! There is no fallback: a pin that is missing from the candidate set, or
//! that goes down, is reported as an error and the connection has no path.

use tracing::{debug, error};

use super::Outcome;
use crate::error::{Error, Result};
use crate::types::{Path, PathFingerprint, PathInterface};

/// Always selects the candidate with the pinned fingerprint.
#[derive(Debug)]
pub struct ConstantSelector {
    pinned: PathFingerprint,
    paths: Vec<Path>,
    selected: Option<usize>,
}

impl ConstantSelector {
    pub fn new(pinned: impl Into<PathFingerprint>) -> Self {
        Self {
            pinned: pinned.into(),
            paths: Vec::new(),
            selected: None,
        }
    }

    pub fn initialize(&mut self, paths: Vec<Path>) -> Result<Option<&Path>> {
        self.paths = paths;
        self.locate()?;
        debug!(fp = %self.pinned, "found path");
        Ok(self.path())
    }

    pub fn path(&self) -> Option<&Path> {
        self.selected.and_then(|i| self.paths.get(i))
    }

    pub fn candidates(&self) -> &[Path] {
        &self.paths
    }

    /// Relocate the pin. After an earlier failure left the connection without
    /// a path, finding the pin again is a change.
    pub fn refresh(&mut self, paths: Vec<Path>) -> Result<Outcome> {
        let before = self.path().cloned();
        self.paths = paths;
        self.locate()?;
        Ok(Outcome::between(before.as_ref(), self.path()))
    }

    pub fn path_down(&mut self, fp: &PathFingerprint, pi: &PathInterface) -> Result<Outcome> {
        let before = self.path().cloned();
        let pinned_down = before.as_ref().is_some_and(|p| p.is_down(fp, pi));

        self.paths.retain(|p| !p.is_down(fp, pi));

        if pinned_down {
            self.selected = None;
            error!(fp = %self.pinned, fingerprint = %fp, interface = %pi, "selected path down");
            return Err(Error::PinnedPathDown(self.pinned.clone()));
        }

        self.selected = self.paths.iter().position(|p| p.fingerprint == self.pinned);
        Ok(Outcome::between(before.as_ref(), self.path()))
    }

    fn locate(&mut self) -> Result<()> {
        self.selected = self.paths.iter().position(|p| p.fingerprint == self.pinned);
        if self.selected.is_none() {
            error!(fp = %self.pinned, candidates = self.paths.len(), "could not find requested path");
            return Err(Error::PinnedPathNotFound(self.pinned.clone()));
        }
        Ok(())
    }
}
