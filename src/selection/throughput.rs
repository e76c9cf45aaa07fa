//! Oracle-driven throughput ranking.
//!
//! Candidates are ranked by the oracle's throughput score (highest first,
//! unscored paths count as zero), ties by hop count (fewest first). New
//! candidate sets are shuffled once on intake; re-ranking is a stable sort,
//! so paths that still tie keep their place and the selection only moves
//! when the ranking does.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::Outcome;
use crate::error::Result;
use crate::oracle::{OracleApi, ScoringQuery};
use crate::types::{IsdAs, Path, PathFingerprint, PathInterface};

/// Cached oracle scores keyed by path fingerprint.
pub type Scores = HashMap<PathFingerprint, f64>;

/// Where a throughput selector gets its scores from.
#[derive(Clone)]
pub struct ScoreSource {
    oracle: Arc<dyn OracleApi>,
    score_name: String,
}

impl ScoreSource {
    pub fn new(oracle: Arc<dyn OracleApi>, score_name: impl Into<String>) -> Self {
        Self {
            oracle,
            score_name: score_name.into(),
        }
    }

    /// Fetch the configured score for every path towards `remote`.
    pub async fn fetch(&self, remote: IsdAs) -> Result<Scores> {
        let query = ScoringQuery::single(remote, self.score_name.as_str());
        let mut response = self.oracle.fetch_scores(&query).await?;

        let scores: Scores = response
            .remove(&remote)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| {
                let score = e.scores.get(&self.score_name).copied()?;
                Some((e.fingerprint, score))
            })
            .collect();

        info!(remote = %remote, amount = scores.len(), "successfully fetched scores from oracle");
        Ok(scores)
    }
}

impl std::fmt::Debug for ScoreSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreSource")
            .field("score_name", &self.score_name)
            .finish_non_exhaustive()
    }
}

/// Keeps the candidate set ordered best-first by oracle score.
#[derive(Debug, Default)]
pub struct ThroughputSelector {
    paths: Vec<Path>,
    scores: Scores,
}

impl ThroughputSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, paths: Vec<Path>) -> Option<&Path> {
        self.intake(paths, None, &mut rand::thread_rng());
        if let Some(best) = self.paths.first() {
            info!(fp = %best.fingerprint, "selected initial path for connection");
        }
        self.paths.first()
    }

    pub fn path(&self) -> Option<&Path> {
        self.paths.first()
    }

    pub fn candidates(&self) -> &[Path] {
        &self.paths
    }

    pub fn refresh(&mut self, paths: Vec<Path>) -> Outcome {
        let before = self.paths.first().cloned();
        self.intake(paths, before.as_ref(), &mut rand::thread_rng());
        self.log_change(before.as_ref(), "changed path on refresh")
    }

    pub fn path_down(&mut self, fp: &PathFingerprint, pi: &PathInterface) -> Outcome {
        let before = self.paths.first().cloned();
        self.paths.retain(|p| !p.is_down(fp, pi));
        self.rank();
        self.log_change(before.as_ref(), "changed path on path down")
    }

    /// Replace the cached scores and re-rank.
    pub fn rescore(&mut self, scores: Scores) -> Outcome {
        self.scores = scores;
        let before = self.paths.first().cloned();
        self.rank();
        self.log_change(before.as_ref(), "changed path on new oracle scores")
    }

    fn score(&self, path: &Path) -> f64 {
        self.scores.get(&path.fingerprint).copied().unwrap_or(0.0)
    }

    /// Install a new candidate set in random order, keeping the current
    /// selection in front so it wins every tie, then rank.
    fn intake<R: Rng + ?Sized>(&mut self, mut paths: Vec<Path>, current: Option<&Path>, rng: &mut R) {
        paths.shuffle(rng);
        if let Some(current) = current {
            if let Some(i) = paths.iter().position(|p| p.fingerprint == current.fingerprint) {
                paths[..=i].rotate_right(1);
            }
        }
        self.paths = paths;
        self.rank();
    }

    /// Stable sort by score, then hops.
    fn rank(&mut self) {
        let mut paths = std::mem::take(&mut self.paths);
        paths.sort_by(|a, b| {
            self.score(b)
                .total_cmp(&self.score(a))
                .then_with(|| a.hops().cmp(&b.hops()))
        });
        self.paths = paths;
    }

    fn log_change(&self, before: Option<&Path>, message: &str) -> Outcome {
        let outcome = Outcome::between(before, self.paths.first());
        if let Outcome::Changed(ref after) = outcome {
            info!(
                previous_fp = ?before.map(|p| &p.fingerprint),
                new_fp = ?after.as_ref().map(|p| &p.fingerprint),
                "{message}"
            );
        } else {
            debug!(candidates = self.paths.len(), "selection unchanged");
        }
        outcome
    }
}
