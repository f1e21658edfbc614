use crate::{error::EmuError, Real, Result, INF, NAN};
use getset::CopyGetters;
use serde::{Deserialize, Serialize};

/// Running accumulator for simple summary statistics.
#[derive(Debug, Copy, Clone, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct PointStatsAcc {
    n: usize,
    m1: Real,
    m2: Real,
    min: Real,
    max: Real,
}

impl PointStatsAcc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, x: Real) {
        self.n += 1;
        self.m1 += x;
        self.m2 += x * x;
        self.min = Real::min(x, self.min);
        self.max = Real::max(x, self.max);
    }

    pub fn add_many<I>(&mut self, xs: I)
    where
        I: IntoIterator<Item = Real>,
    {
        for x in xs {
            self.add(x);
        }
    }

    pub fn mean(&self) -> Real {
        self.m1 / self.n as Real
    }

    pub fn var(&self) -> Real {
        let m = self.mean();
        self.m2 / self.n as Real - m * m
    }

    pub fn std(&self) -> Real {
        self.var().max(0.0).sqrt()
    }

    pub fn stats(&self) -> PointStats {
        PointStats {
            mean: self.mean(),
            std: self.std(),
            min: self.min,
            max: self.max,
            size: self.n,
        }
    }
}

impl Default for PointStatsAcc {
    fn default() -> Self {
        PointStatsAcc {
            n: 0,
            m1: 0.,
            m2: 0.,
            min: INF,
            max: -INF,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, CopyGetters, Deserialize, Serialize)]
#[getset(get_copy = "pub")]
pub struct PointStats {
    mean: Real,
    std: Real,
    min: Real,
    max: Real,
    size: usize,
}

/// Check that all levels are valid probabilities.
pub fn check_levels(levels: &[Real]) -> Result<()> {
    match levels.iter().find(|q| !(**q >= 0.0 && **q <= 1.0)) {
        Some(&q) => Err(EmuError::InvalidQuantile(q)),
        None => Ok(()),
    }
}

/// Quantile of already sorted data, interpolating linearly between the
/// closest order statistics. Empty data has a NaN quantile.
pub fn quantile_sorted(sorted: &[Real], q: Real) -> Real {
    match sorted.len() {
        0 => NAN,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as Real;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as Real;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Quantiles of data for each level. NaN values are ignored.
pub fn quantiles(data: &[Real], levels: &[Real]) -> Result<Vec<Real>> {
    check_levels(levels)?;
    let mut sorted: Vec<Real> = data.iter().cloned().filter(|x| !x.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(levels.iter().map(|&q| quantile_sorted(&sorted, q)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn simple_stats() {
        let mut acc = PointStatsAcc::new();
        acc.add(0.);
        acc.add_many(vec![1., 2., 3., 4.]);
        let st = acc.stats();
        assert_eq!(st.size(), 5);
        assert_approx_eq!(st.mean(), 2.0, 0.001);
        assert_approx_eq!(st.std(), 1.4142, 0.001);
        assert_eq!(st.min(), 0.0);
        assert_eq!(st.max(), 4.0);
    }

    #[test]
    fn interpolated_quantiles() {
        let q = quantiles(&[4.0, 1.0, 3.0, 2.0], &[0.0, 0.5, 1.0, 0.25]).unwrap();
        assert_approx_eq!(q[0], 1.0);
        assert_approx_eq!(q[1], 2.5);
        assert_approx_eq!(q[2], 4.0);
        assert_approx_eq!(q[3], 1.75);
        assert!(matches!(quantiles(&[1.0], &[1.5]), Err(EmuError::InvalidQuantile(_))));
        assert!(quantiles(&[], &[0.5]).unwrap()[0].is_nan());
    }
}
