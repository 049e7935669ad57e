use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Which reference records a verification pass reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SamplePlan {
    Full,
    /// `fraction` in `(0, 1]`; the same seed always selects the same records.
    Fraction { fraction: f64, seed: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SampleError {
    InvalidFraction(f64),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::InvalidFraction(x) => {
                write!(f, "sample fraction must be in (0, 1], got {x}")
            }
        }
    }
}

impl std::error::Error for SampleError {}

impl SamplePlan {
    pub fn fraction(fraction: f64, seed: u64) -> Result<Self, SampleError> {
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(SampleError::InvalidFraction(fraction));
        }
        if fraction == 1.0 {
            return Ok(SamplePlan::Full);
        }
        Ok(SamplePlan::Fraction { fraction, seed })
    }

    /// Records to check out of `n`: `floor(n * fraction)`, at least one when
    /// `n > 0`, never more than `n`.
    pub fn sample_size(&self, n: usize) -> usize {
        match *self {
            SamplePlan::Full => n,
            SamplePlan::Fraction { fraction, .. } => {
                if n == 0 {
                    return 0;
                }
                let k = (n as f64 * fraction).floor() as usize;
                k.clamp(1, n)
            }
        }
    }

    /// Ascending positions into a reference of length `n`.
    pub fn select(&self, n: usize) -> Vec<usize> {
        match *self {
            SamplePlan::Full => (0..n).collect(),
            SamplePlan::Fraction { seed, .. } => {
                let k = self.sample_size(n);
                let mut rng = StdRng::seed_from_u64(seed);
                let mut picked = rand::seq::index::sample(&mut rng, n, k).into_vec();
                picked.sort_unstable();
                picked
            }
        }
    }
}
