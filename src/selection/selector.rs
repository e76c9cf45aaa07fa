//! Per-connection selector handle driven by the transport.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    Outcome, PathPublisher, PathSubscriber, Policy, ScoreSource, Scores, SelectorConfig,
    SelectorKind,
};
use crate::error::{Error, Result};
use crate::oracle::OracleApi;
use crate::types::{dedup_paths, Endpoint, IsdAs, Path, PathFingerprint, PathInterface};

/// Selects the active path of one connection.
///
/// All operations take the selector's lock for their full duration. Changes
/// of the selected path are published to subscribers without blocking.
pub struct PathSelector {
    policy: Arc<Mutex<Policy>>,
    publisher: PathPublisher,
    scoring: Option<ScoreSource>,
    fetch_interval: Duration,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl PathSelector {
    /// Create a selector. The oracle client is only used by the oracle policy,
    /// which cannot run without one.
    pub fn new(config: &SelectorConfig, oracle: Option<Arc<dyn OracleApi>>) -> Result<Self> {
        let policy = Policy::from_config(config)?;

        let scoring = match (config.kind, oracle) {
            (SelectorKind::Oracle, Some(oracle)) => {
                Some(ScoreSource::new(oracle, config.score_name.clone()))
            }
            (SelectorKind::Oracle, None) => {
                return Err(Error::InvalidConfig(
                    "oracle selector requires an oracle client".into(),
                ))
            }
            _ => None,
        };

        Ok(Self {
            policy: Arc::new(Mutex::new(policy)),
            publisher: PathPublisher::new(),
            scoring,
            fetch_interval: config.fetch_scores_interval,
            refresh_task: Mutex::new(None),
        })
    }

    pub fn kind(&self) -> SelectorKind {
        self.policy.lock().kind()
    }

    /// Subscribe to selection changes.
    pub fn subscribe(&self) -> PathSubscriber {
        self.publisher.subscribe()
    }

    /// Install the initial candidate set and announce the first pick.
    pub async fn initialize(&self, local: &Endpoint, remote: &Endpoint, paths: Vec<Path>) -> Result<()> {
        let kind = self.kind();
        debug!(selector = %kind, %local, %remote, amount = paths.len(), "initialize");
        let paths = dedup_paths(paths);

        let scores = match self.scoring {
            Some(ref source) => Some(fetch_or_empty(source, remote.ia).await),
            None => None,
        };

        {
            let mut policy = self.policy.lock();
            if let Some(scores) = scores {
                policy.rescore(scores);
            }
            if let Some(path) = policy.initialize(paths)? {
                info!(selector = %kind, fp = %path.fingerprint, "selected initial path");
                self.publisher.publish(Some(path));
            }
        }

        if let Some(ref source) = self.scoring {
            if !self.fetch_interval.is_zero() {
                self.start_score_refresh(source.clone(), remote.ia);
            }
        }
        Ok(())
    }

    /// The currently selected path.
    pub fn path(&self) -> Option<Path> {
        let policy = self.policy.lock();
        if policy.path().is_none() {
            debug!(selector = %policy.kind(), "no paths present");
        }
        policy.path().cloned()
    }

    /// Current candidate set in ranking order.
    pub fn candidates(&self) -> Vec<Path> {
        self.policy.lock().candidates().to_vec()
    }

    /// Replace the candidate set after re-discovery.
    pub fn refresh(&self, paths: Vec<Path>) -> Result<()> {
        let mut policy = self.policy.lock();
        debug!(selector = %policy.kind(), amount = paths.len(), "refresh");
        let result = policy.refresh(dedup_paths(paths));
        self.settle(result)
    }

    /// Drop candidates matching the fingerprint or crossing the interface.
    pub fn path_down(&self, fp: &PathFingerprint, pi: &PathInterface) -> Result<()> {
        let mut policy = self.policy.lock();
        debug!(selector = %policy.kind(), fingerprint = %fp, interface = %pi, "path down");
        let result = policy.path_down(fp, pi);
        self.settle(result)
    }

    /// Stop the score refresh timer. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        debug!(selector = %self.kind(), "close");
        if let Some(task) = self.refresh_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    /// Publish the outcome of an operation. A failing operation leaves the
    /// connection without a path, which subscribers must learn about.
    fn settle(&self, result: Result<Outcome>) -> Result<()> {
        match result {
            Ok(outcome) => {
                announce(&self.publisher, outcome);
                Ok(())
            }
            Err(e) => {
                self.publisher.publish(None);
                Err(e)
            }
        }
    }

    fn start_score_refresh(&self, source: ScoreSource, remote: IsdAs) {
        let policy = Arc::clone(&self.policy);
        let publisher = self.publisher.clone();
        let period = self.fetch_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Nothing to decide between.
                if policy.lock().candidates().len() < 2 {
                    continue;
                }

                let scores = match source.fetch(remote).await {
                    Ok(scores) => scores,
                    Err(e) => {
                        warn!(remote = %remote, error = %e, "error fetching scores, keeping previous");
                        continue;
                    }
                };

                let mut policy = policy.lock();
                let outcome = policy.rescore(scores);
                announce(&publisher, outcome);
            }
        });

        if let Some(previous) = self.refresh_task.lock().replace(task) {
            previous.abort();
        }
    }
}

impl Drop for PathSelector {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for PathSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathSelector")
            .field("policy", &self.kind())
            .field("fetch_interval", &self.fetch_interval)
            .finish_non_exhaustive()
    }
}

fn announce(publisher: &PathPublisher, outcome: Outcome) {
    if let Outcome::Changed(path) = outcome {
        publisher.publish(path);
    }
}

async fn fetch_or_empty(source: &ScoreSource, remote: IsdAs) -> Scores {
    match source.fetch(remote).await {
        Ok(scores) => scores,
        Err(e) => {
            warn!(remote = %remote, error = %e, "error fetching scores from oracle");
            Scores::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::test_support::path;

    fn endpoints() -> (Endpoint, Endpoint) {
        (
            Endpoint::new(IsdAs::new(1, 0xff00_0000_0110), "127.0.0.1:4000".parse().unwrap()),
            Endpoint::new(IsdAs::new(1, 0xff00_0000_0111), "127.0.0.1:5000".parse().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_initial_pick_is_published() {
        let selector = PathSelector::new(&SelectorConfig::default(), None).unwrap();
        let mut sub = selector.subscribe();
        let (local, remote) = endpoints();

        selector
            .initialize(&local, &remote, vec![path("a", 3, 0), path("b", 1, 10)])
            .await
            .unwrap();

        assert!(sub.changed().await);
        assert_eq!(sub.latest().unwrap().fingerprint.as_str(), "b");
        assert_eq!(selector.path().unwrap().fingerprint.as_str(), "b");
    }

    #[tokio::test]
    async fn test_duplicates_removed_on_intake() {
        let selector = PathSelector::new(&SelectorConfig::default(), None).unwrap();
        let (local, remote) = endpoints();
        selector
            .initialize(&local, &remote, vec![path("a", 1, 0), path("a", 2, 10), path("b", 2, 20)])
            .await
            .unwrap();
        assert_eq!(selector.candidates().len(), 2);
    }

    #[test]
    fn test_oracle_kind_requires_client() {
        let err = PathSelector::new(&SelectorConfig::with_kind(SelectorKind::Oracle), None).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let selector = PathSelector::new(&SelectorConfig::default(), None).unwrap();
        selector.close().unwrap();
        selector.close().unwrap();
    }
}
