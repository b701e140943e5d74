//! Seedable random source used for fuzzy-interval sampling and tie-breaking.

use rand::distributions::Open01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::AdapterError;

/// Not `Clone`: two copies would silently replay the same stream.
#[derive(Debug)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn reseed_from_entropy(&mut self) {
        self.rng = StdRng::from_entropy();
    }

    /// Uniform draw from the open interval (0, 1).
    pub fn uniform01(&mut self) -> f64 {
        self.rng.sample(Open01)
    }

    pub fn normal(&mut self, mean: f64, sd: f64) -> Result<f64, AdapterError> {
        if !(sd.is_finite() && sd > 0.0) {
            tracing::warn!(sd, "Normal draw requested with non-positive standard deviation");
            return Err(AdapterError::InvalidDeviation(sd));
        }
        let normal = Normal::new(mean, sd).map_err(|_| AdapterError::InvalidDeviation(sd))?;
        Ok(normal.sample(&mut self.rng))
    }

    /// Half-normal draw on one side of `center`: `center + |N(0, sd)|` when
    /// `upper` is set, `center - |N(0, sd)|` otherwise.
    pub fn normal_one_sided(
        &mut self,
        center: f64,
        sd: f64,
        upper: bool,
    ) -> Result<f64, AdapterError> {
        let offset = self.normal(0.0, sd)?.abs();
        Ok(if upper { center + offset } else { center - offset })
    }

    /// Uniform index in `[0, n)`; `None` for an empty range.
    pub fn choose_index(&mut self, n: usize) -> Option<usize> {
        if n == 0 {
            return None;
        }
        Some(self.rng.gen_range(0..n))
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = RandomSource::from_seed(42);
        let mut b = RandomSource::from_seed(42);
        for _ in 0..20 {
            assert_eq!(a.uniform01(), b.uniform01());
            assert_eq!(a.normal(0.75, 0.1).unwrap(), b.normal(0.75, 0.1).unwrap());
            assert_eq!(a.choose_index(7), b.choose_index(7));
        }
    }

    #[test]
    fn reseed_restarts_stream() {
        let mut rng = RandomSource::from_seed(7);
        let first: Vec<f64> = (0..5).map(|_| rng.uniform01()).collect();
        rng.reseed(7);
        let second: Vec<f64> = (0..5).map(|_| rng.uniform01()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn reseed_from_entropy_leaves_the_seeded_stream() {
        let mut seeded = RandomSource::from_seed(7);
        let expected: Vec<f64> = (0..8).map(|_| seeded.uniform01()).collect();

        let mut rng = RandomSource::from_seed(7);
        rng.reseed_from_entropy();
        let drawn: Vec<f64> = (0..8).map(|_| rng.uniform01()).collect();
        assert_ne!(drawn, expected);
        assert!(drawn.iter().all(|x| *x > 0.0 && *x < 1.0));
    }

    #[test]
    fn uniform_is_open_interval() {
        let mut rng = RandomSource::from_seed(1);
        for _ in 0..10_000 {
            let x = rng.uniform01();
            assert!(x > 0.0 && x < 1.0);
        }
    }

    #[test]
    fn normal_rejects_non_positive_sd() {
        let mut rng = RandomSource::from_seed(1);
        assert_eq!(rng.normal(0.0, 0.0), Err(AdapterError::InvalidDeviation(0.0)));
        assert!(rng.normal(0.0, -1.0).is_err());
        assert!(rng.normal(0.0, f64::NAN).is_err());
    }

    #[test]
    fn one_sided_respects_side() {
        let mut rng = RandomSource::from_seed(3);
        for _ in 0..500 {
            assert!(rng.normal_one_sided(0.5, 0.1, true).unwrap() >= 0.5);
            assert!(rng.normal_one_sided(0.5, 0.1, false).unwrap() <= 0.5);
        }
    }

    #[test]
    fn choose_index_in_range() {
        let mut rng = RandomSource::from_seed(9);
        assert_eq!(rng.choose_index(0), None);
        assert_eq!(rng.choose_index(1), Some(0));
        for _ in 0..1000 {
            let i = rng.choose_index(5).unwrap();
            assert!(i < 5);
        }
    }
}
