//! Execution trace of a log-probability program.
//!
//! A calibration program declares its random variables through a [`Trace`].
//! In prior mode every site is drawn from its distribution; in conditioned
//! mode values are replayed from a supplied [`ParamSet`]. Either way, each site
//! records its log-density so the trace ends up holding the unnormalized log
//! posterior of the values it saw.
use crate::{
    error::EmuError,
    params::{ParamSet, ParamValue},
    priors::Prior,
    Real, Result,
};
use getset::{CopyGetters, Getters};
use rand::rngs::SmallRng;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SiteKind {
    /// A random variable with a prior.
    Sample,
    /// A derived quantity. Contributes nothing to the density.
    Deterministic,
    /// An additive log-probability term, e.g. a likelihood.
    Factor,
}

/// A single named entry of a trace.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Site {
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    kind: SiteKind,
    #[getset(get = "pub")]
    value: ParamValue,
    #[getset(get_copy = "pub")]
    log_prob: Real,
}

enum Mode<'a> {
    Prior(&'a mut SmallRng),
    Condition(&'a ParamSet),
}

/// Records sample sites and log-probability factors.
pub struct Trace<'a> {
    mode: Mode<'a>,
    sites: Vec<Site>,
}

impl<'a> Trace<'a> {
    /// Trace that draws every sample site from its prior.
    pub fn prior(rng: &'a mut SmallRng) -> Self {
        Trace {
            mode: Mode::Prior(rng),
            sites: Vec::new(),
        }
    }

    /// Trace that replays sample sites from values.
    pub fn condition(values: &'a ParamSet) -> Self {
        Trace {
            mode: Mode::Condition(values),
            sites: Vec::new(),
        }
    }

    /// Declare a scalar random variable.
    pub fn sample(&mut self, name: &str, prior: &Prior) -> Result<Real> {
        let x = match &mut self.mode {
            Mode::Prior(rng) => prior.sample(&mut **rng)?,
            Mode::Condition(values) => values.scalar(name)?,
        };
        self.push(name, SiteKind::Sample, x.into(), prior.ln_pdf(x));
        Ok(x)
    }

    /// Declare a vector of n independent draws from the same prior.
    ///
    /// Replayed vectors must have exactly n components.
    pub fn sample_iid(&mut self, name: &str, prior: &Prior, n: usize) -> Result<Vec<Real>> {
        let xs = match &mut self.mode {
            Mode::Prior(rng) => {
                let mut xs = Vec::with_capacity(n);
                for _ in 0..n {
                    xs.push(prior.sample(&mut **rng)?);
                }
                xs
            }
            Mode::Condition(values) => {
                let xs = values.vector(name)?;
                if xs.len() != n {
                    return Err(EmuError::DimensionMismatch {
                        name: name.to_string(),
                        expected: n,
                        found: xs.len(),
                    });
                }
                xs.to_vec()
            }
        };
        let lp: Real = xs.iter().map(|&x| prior.ln_pdf(x)).sum();
        self.push(name, SiteKind::Sample, xs.clone().into(), lp);
        Ok(xs)
    }

    /// Record a derived value.
    pub fn deterministic(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.push(name, SiteKind::Deterministic, value.into(), 0.0);
    }

    /// Add an arbitrary log-probability term.
    pub fn factor(&mut self, name: &str, log_prob: Real) {
        self.push(name, SiteKind::Factor, log_prob.into(), log_prob);
    }

    fn push(&mut self, name: &str, kind: SiteKind, value: ParamValue, log_prob: Real) {
        self.sites.push(Site {
            name: name.to_string(),
            kind,
            value,
            log_prob,
        });
    }

    /// Sum of all log-densities and factors.
    pub fn log_joint(&self) -> Real {
        self.sites.iter().map(|s| s.log_prob).sum()
    }

    /// Values of all sample sites.
    pub fn sampled(&self) -> ParamSet {
        self.sites
            .iter()
            .filter(|s| s.kind == SiteKind::Sample)
            .map(|s| (s.name.clone(), s.value.clone()))
            .collect()
    }

    pub fn site(&self, name: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    fn program(trace: &mut Trace) -> Result<()> {
        let scale = trace.sample("scale", &Prior::HalfNormal { scale: 1.0 })?;
        let xs = trace.sample_iid("xs", &Prior::Normal { loc: 0.0, scale }, 3)?;
        trace.deterministic("total", xs.iter().sum::<Real>());
        trace.factor("ll", -1.5);
        Ok(())
    }

    #[test]
    fn prior_then_condition_agree() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut trace = Trace::prior(&mut rng);
        program(&mut trace).unwrap();
        let values = trace.sampled();
        assert_eq!(values.len(), 2);
        assert_eq!(values.vector("xs").unwrap().len(), 3);

        let mut replay = Trace::condition(&values);
        program(&mut replay).unwrap();
        assert_approx_eq!(replay.log_joint(), trace.log_joint());
        assert_eq!(replay.site("ll").unwrap().kind(), SiteKind::Factor);
    }

    #[test]
    fn log_joint_sums_sites() {
        let values = ParamSet::new()
            .with("scale", 1.0)
            .with("xs", vec![0.0, 0.0, 0.0]);
        let mut trace = Trace::condition(&values);
        program(&mut trace).unwrap();
        let half = Prior::HalfNormal { scale: 1.0 }.ln_pdf(1.0);
        let normal = Prior::Normal { loc: 0.0, scale: 1.0 }.ln_pdf(0.0);
        assert_approx_eq!(trace.log_joint(), half + 3.0 * normal - 1.5);
    }

    #[test]
    fn replay_rejects_wrong_length() {
        let values = ParamSet::new()
            .with("scale", 1.0)
            .with("xs", vec![0.0, 0.0]);
        let mut trace = Trace::condition(&values);
        assert!(matches!(
            program(&mut trace),
            Err(EmuError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
    }
}
