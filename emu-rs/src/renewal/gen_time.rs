use crate::{error::EmuError, Real, Result};
use statrs::distribution::{ContinuousCDF, Gamma};

/// Discretized generation-time density.
///
/// Entry k holds the probability that a secondary infection happens k + 1
/// days after the primary one. A gamma distribution with the given mean and
/// standard deviation is integrated over each day and renormalized over the
/// window.
pub fn gen_time_density(mean: Real, sd: Real, window: usize) -> Result<Vec<Real>> {
    if !(mean > 0.0 && mean.is_finite()) {
        return Err(EmuError::invalid_input("gen_mean", format!("{} is not positive", mean)));
    }
    if !(sd > 0.0 && sd.is_finite()) {
        return Err(EmuError::invalid_input("gen_sd", format!("{} is not positive", sd)));
    }
    let shape = (mean / sd).powi(2);
    let rate = mean / (sd * sd);
    let gamma = Gamma::new(shape, rate).map_err(|e| EmuError::invalid_input("gen_mean", e))?;

    let mut density: Vec<Real> = (0..window)
        .map(|k| gamma.cdf((k + 1) as Real) - gamma.cdf(k as Real))
        .collect();
    let total: Real = density.iter().sum();
    if !(total > 0.0) {
        return Err(EmuError::invalid_input(
            "gen_mean",
            "generation time has no mass inside the window",
        ));
    }
    for x in density.iter_mut() {
        *x /= total;
    }
    Ok(density)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn normalized_with_expected_mean() {
        let w = gen_time_density(5.0, 2.0, 40).unwrap();
        assert_eq!(w.len(), 40);
        assert_approx_eq!(w.iter().sum::<Real>(), 1.0);
        let mean: Real = w.iter().enumerate().map(|(k, p)| (k as Real + 0.5) * p).sum();
        assert_approx_eq!(mean, 5.0, 0.05);
    }

    #[test]
    fn rejects_bad_moments() {
        assert!(gen_time_density(0.0, 1.0, 10).is_err());
        assert!(gen_time_density(4.0, -1.0, 10).is_err());
    }
}
