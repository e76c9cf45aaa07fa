//! Folded-normal random selection over the hop-ranked candidate set.
//!
//! Candidates are sorted by hop count and an index is drawn as
//! `floor(|X|)` with `X ~ Normal(0, (n / div)^2)`, resampling until the
//! index is in range. Larger divisors concentrate the draw on short paths.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use super::{rank_by_hops, Outcome, MIN_NORM_DIVISOR};
use crate::error::{Error, Result};
use crate::types::{Path, PathFingerprint, PathInterface};

/// Re-draws its selection on every initialize, refresh and path down.
#[derive(Debug)]
pub struct NormSelector {
    paths: Vec<Path>,
    selected: Option<usize>,
    div: f64,
}

impl NormSelector {
    pub fn new(div: f64) -> Self {
        Self {
            paths: Vec::new(),
            selected: None,
            div,
        }
    }

    pub fn initialize(&mut self, paths: Vec<Path>) -> Result<Option<&Path>> {
        self.paths = paths;
        self.select(&mut rand::thread_rng())?;
        debug!(div = self.div, amount_paths = self.paths.len(), selected = ?self.selected, "initialize");
        Ok(self.path())
    }

    pub fn path(&self) -> Option<&Path> {
        self.selected.and_then(|i| self.paths.get(i))
    }

    pub fn candidates(&self) -> &[Path] {
        &self.paths
    }

    pub fn refresh(&mut self, paths: Vec<Path>) -> Result<Outcome> {
        let before = self.path().cloned();
        self.paths = paths;
        self.select(&mut rand::thread_rng())?;
        Ok(Outcome::between(before.as_ref(), self.path()))
    }

    pub fn path_down(&mut self, fp: &PathFingerprint, pi: &PathInterface) -> Result<Outcome> {
        let before = self.path().cloned();
        self.paths.retain(|p| !p.is_down(fp, pi));
        self.select(&mut rand::thread_rng())?;
        Ok(Outcome::between(before.as_ref(), self.path()))
    }

    fn select<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        rank_by_hops(&mut self.paths, rng);
        self.selected = draw_index(self.paths.len(), self.div, rng)?;
        Ok(())
    }
}

/// Draw a folded-normal index in `[0, n)`. Returns `None` for an empty set.
pub(crate) fn draw_index<R: Rng + ?Sized>(n: usize, div: f64, rng: &mut R) -> Result<Option<usize>> {
    if n == 0 {
        return Ok(None);
    }

    if !div.is_finite() || div < MIN_NORM_DIVISOR {
        return Err(Error::InvalidConfig(format!(
            "norm divisor must be at least {MIN_NORM_DIVISOR}, got {div}"
        )));
    }

    let count = n as f64;
    let normal = Normal::new(0.0, count / div)
        .map_err(|e| Error::InvalidConfig(format!("norm divisor {div}: {e}")))?;

    loop {
        let x: f64 = normal.sample(rng).abs();
        if x < count {
            return Ok(Some(x.floor() as usize));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::test_support::path;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mean_index(n: usize, div: f64, seed: u64) -> f64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let draws = 2000;
        let total: usize = (0..draws)
            .map(|_| draw_index(n, div, &mut rng).unwrap().unwrap())
            .sum();
        total as f64 / f64::from(draws)
    }

    #[test]
    fn test_draw_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for n in 1..12 {
            for _ in 0..500 {
                let i = draw_index(n, 0.5, &mut rng).unwrap().unwrap();
                assert!(i < n);
            }
        }
    }

    #[test]
    fn test_tiny_divisor_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(draw_index(4, 1e-12, &mut rng).is_err());
        assert!(draw_index(4, f64::NAN, &mut rng).is_err());
        assert!(draw_index(4, MIN_NORM_DIVISOR, &mut rng).unwrap().unwrap() < 4);
    }

    #[test]
    fn test_draw_on_empty_set() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(draw_index(0, 2.0, &mut rng).unwrap(), None);
    }

    #[test]
    fn test_larger_divisor_concentrates_on_short_paths() {
        let wide = mean_index(9, 1.0, 42);
        let narrow = mean_index(9, 8.0, 42);
        assert!(narrow < wide, "narrow={narrow} wide={wide}");
        assert!(narrow < 1.0);
    }

    #[test]
    fn test_path_down_of_only_candidate() {
        let mut selector = NormSelector::new(2.0);
        let only = path("a", 2, 0);
        selector.initialize(vec![only.clone()]).unwrap();
        assert_eq!(selector.path(), Some(&only));

        let outcome = selector.path_down(&"a".into(), &PathInterface::default()).unwrap();
        assert_eq!(outcome, Outcome::Changed(None));
        assert!(selector.path().is_none());
    }

    #[test]
    fn test_refresh_with_single_candidate_reports_change_once() {
        let mut selector = NormSelector::new(2.0);
        selector.initialize(vec![path("a", 1, 0)]).unwrap();

        assert_eq!(selector.refresh(vec![path("a", 1, 0)]).unwrap(), Outcome::Unchanged);
        assert_eq!(
            selector.refresh(vec![path("b", 1, 10)]).unwrap(),
            Outcome::Changed(Some(path("b", 1, 10)))
        );
    }

    #[test]
    fn test_refresh_to_empty() {
        let mut selector = NormSelector::new(2.0);
        selector.initialize(vec![path("a", 1, 0)]).unwrap();
        assert_eq!(selector.refresh(vec![]).unwrap(), Outcome::Changed(None));
    }
}
