//! Sampling source for FULL mode legacy shadow calls

/// Source of uniform samples in `[0, 1)`
pub trait Sampler: Send + Sync + std::fmt::Debug {
    /// Draw one sample
    fn sample(&self) -> f64;
}

/// Thread-local RNG sampler
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    #[inline]
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Sampler returning a constant, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub f64);

impl Sampler for FixedSampler {
    #[inline]
    fn sample(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_sampler_in_unit_interval() {
        let sampler = RandomSampler;
        for _ in 0..1_000 {
            let s = sampler.sample();
            assert!((0.0..1.0).contains(&s));
        }
    }
}
