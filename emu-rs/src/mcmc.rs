//! Random-walk Metropolis sampler for calibration programs.
//!
//! Each chain starts from a prior draw. Proposal scales are set per component
//! from the spread of prior draws and multiplied by a global factor that is
//! adapted during warmup toward the usual 0.234 acceptance rate.
use crate::{
    calibration::Calibration,
    error::EmuError,
    params::{ParamSet, ParamValue},
    trace::Trace,
    utils::PointStatsAcc,
    Real, Result, INF,
};
use getset::{CopyGetters, Getters};
use log::*;
use rand::{prelude::SmallRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const TARGET_ACCEPT: Real = 0.234;
const INIT_ATTEMPTS: usize = 100;
const SCALE_DRAWS: usize = 50;
const SCALE_ATTEMPTS_FACTOR: usize = 20;

/// Sampler settings.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Getters, CopyGetters)]
#[serde(default)]
#[getset(get_copy = "pub")]
pub struct Metropolis {
    chains: usize,
    warmup: usize,
    draws: usize,
    seed: u64,
    step_size: Real,
}

impl Default for Metropolis {
    fn default() -> Self {
        Metropolis {
            chains: 2,
            warmup: 1_000,
            draws: 1_000,
            seed: 0,
            step_size: 0.5,
        }
    }
}

/// Draws of a single chain, after warmup.
#[derive(Debug, Clone, PartialEq, Default, Getters, CopyGetters)]
pub struct Chain {
    #[getset(get = "pub")]
    draws: Vec<ParamSet>,
    #[getset(get = "pub")]
    log_joint: Vec<Real>,
    #[getset(get_copy = "pub")]
    acceptance: Real,
}

/// Draws of all chains.
#[derive(Debug, Clone, PartialEq, Default, Getters)]
#[getset(get = "pub")]
pub struct Posterior {
    chains: Vec<Chain>,
}

impl Posterior {
    /// All draws, chain by chain.
    pub fn draws(&self) -> Vec<ParamSet> {
        self.chains.iter().flat_map(|c| c.draws.iter().cloned()).collect()
    }

    pub fn n_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).sum()
    }

    /// Values of a scalar parameter across all draws.
    pub fn scalar_draws(&self, name: &str) -> Result<Vec<Real>> {
        self.chains
            .iter()
            .flat_map(|c| c.draws.iter())
            .map(|d| d.scalar(name))
            .collect()
    }

    /// Mean, spread and range of a scalar parameter.
    pub fn summary(&self, name: &str) -> Result<crate::utils::PointStats> {
        let mut acc = PointStatsAcc::new();
        acc.add_many(self.scalar_draws(name)?);
        Ok(acc.stats())
    }
}

/// Maps a parameter set to a flat vector and back.
#[derive(Debug, Clone, PartialEq)]
struct Layout {
    entries: Vec<(String, usize, bool)>,
}

impl Layout {
    fn new(params: &ParamSet) -> Self {
        Layout {
            entries: params
                .iter()
                .map(|(k, v)| (k.clone(), v.len(), matches!(v, ParamValue::Vector(_))))
                .collect(),
        }
    }

    fn dim(&self) -> usize {
        self.entries.iter().map(|e| e.1).sum()
    }

    fn flatten(&self, params: &ParamSet) -> Result<Vec<Real>> {
        let mut out = Vec::with_capacity(self.dim());
        for (name, n, _) in self.entries.iter() {
            let value = params
                .get(name)
                .ok_or_else(|| EmuError::MissingParameter(name.clone()))?;
            if value.len() != *n {
                return Err(EmuError::DimensionMismatch {
                    name: name.clone(),
                    expected: *n,
                    found: value.len(),
                });
            }
            out.extend_from_slice(value.as_slice());
        }
        Ok(out)
    }

    fn unflatten(&self, x: &[Real]) -> ParamSet {
        let mut params = ParamSet::new();
        let mut offset = 0;
        for (name, n, is_vector) in self.entries.iter() {
            let chunk = &x[offset..offset + n];
            if *is_vector {
                params.insert(name.as_str(), chunk.to_vec());
            } else {
                params.insert(name.as_str(), chunk[0]);
            }
            offset += n;
        }
        params
    }
}

/// Log posterior density of the values, up to a constant. Values outside the
/// model's domain have zero density.
pub fn log_density<C: Calibration + ?Sized>(calib: &C, values: &ParamSet) -> Result<Real> {
    let mut trace = Trace::condition(values);
    match calib.calibration(&mut trace) {
        Ok(()) => {
            let lp = trace.log_joint();
            Ok(if lp.is_nan() { -INF } else { lp })
        }
        Err(e) if e.is_domain_error() => Ok(-INF),
        Err(e) => Err(e),
    }
}

impl Metropolis {
    pub fn new(chains: usize, warmup: usize, draws: usize, seed: u64) -> Self {
        Metropolis {
            chains,
            warmup,
            draws,
            seed,
            ..Default::default()
        }
    }

    pub fn with_step_size(mut self, step_size: Real) -> Self {
        self.step_size = step_size;
        self
    }

    /// Run all chains in parallel.
    pub fn run<C: Calibration>(&self, calib: &C) -> Result<Posterior> {
        if self.chains == 0 || self.draws == 0 {
            return Err(EmuError::InvalidConfig("sampler needs at least one chain and one draw".into()));
        }
        if !(self.step_size > 0.0) {
            return Err(EmuError::InvalidConfig("step_size must be positive".into()));
        }
        let chains = (0..self.chains)
            .into_par_iter()
            .map(|i| self.run_chain(calib, i))
            .collect::<Result<Vec<_>>>()?;
        for (i, c) in chains.iter().enumerate() {
            info!("chain {}: acceptance rate {:.3}", i, c.acceptance);
        }
        Ok(Posterior { chains })
    }

    fn run_chain<C: Calibration>(&self, calib: &C, chain: usize) -> Result<Chain> {
        let mut rng = SmallRng::seed_from_u64(self.seed.wrapping_add(chain as u64));
        let (layout, mut x, mut lp) = self.initial_point(calib, &mut rng)?;
        let scales = self.proposal_scales(calib, &layout, &mut rng)?;
        debug!("chain {}: start log density {:.3}, dim {}", chain, lp, layout.dim());

        let mut log_step = self.step_size.ln();
        let mut out = Chain::default();
        let mut accepted = 0usize;
        let mut proposal = vec![0.0; x.len()];

        for i in 0..self.warmup + self.draws {
            let step = log_step.exp();
            for ((p, xi), s) in proposal.iter_mut().zip(x.iter()).zip(scales.iter()) {
                let z: Real = rng.sample(StandardNormal);
                *p = xi + step * s * z;
            }
            let lp_new = log_density(calib, &layout.unflatten(&proposal))?;
            let accept = lp_new.is_finite() && rng.gen::<Real>().ln() < lp_new - lp;
            if accept {
                x.copy_from_slice(&proposal);
                lp = lp_new;
            }

            if i < self.warmup {
                let rate = if accept { 1.0 } else { 0.0 };
                log_step += (rate - TARGET_ACCEPT) / ((i + 1) as Real).powf(0.6);
            } else {
                accepted += accept as usize;
                out.draws.push(layout.unflatten(&x));
                out.log_joint.push(lp);
            }
        }
        out.acceptance = accepted as Real / self.draws as Real;
        Ok(out)
    }

    /// Prior draw with finite posterior density.
    fn initial_point<C: Calibration>(
        &self,
        calib: &C,
        rng: &mut SmallRng,
    ) -> Result<(Layout, Vec<Real>, Real)> {
        for _ in 0..INIT_ATTEMPTS {
            let values = match prior_draw(calib, rng)? {
                Some(values) => values,
                None => continue,
            };
            let lp = log_density(calib, &values)?;
            if lp.is_finite() {
                let layout = Layout::new(&values);
                let x = layout.flatten(&values)?;
                return Ok((layout, x, lp));
            }
        }
        Err(EmuError::InvalidConfig(format!(
            "no prior draw with finite density in {} attempts",
            INIT_ATTEMPTS
        )))
    }

    /// Standard deviation of each component across prior draws. Draws outside
    /// the model domain are skipped.
    fn proposal_scales<C: Calibration>(
        &self,
        calib: &C,
        layout: &Layout,
        rng: &mut SmallRng,
    ) -> Result<Vec<Real>> {
        let mut accs = vec![PointStatsAcc::new(); layout.dim()];
        let mut valid = 0;
        for _ in 0..SCALE_DRAWS * SCALE_ATTEMPTS_FACTOR {
            if valid == SCALE_DRAWS {
                break;
            }
            if let Some(values) = prior_draw(calib, rng)? {
                let x = layout.flatten(&values)?;
                for (acc, xi) in accs.iter_mut().zip(x) {
                    acc.add(xi);
                }
                valid += 1;
            }
        }
        if valid < 2 {
            warn!("too few valid prior draws to set proposal scales, using unit scales");
        }
        Ok(accs
            .iter()
            .map(|acc| {
                let sd = acc.std();
                if acc.n() > 1 && sd.is_finite() && sd > 0.0 {
                    sd
                } else {
                    1.0
                }
            })
            .collect())
    }
}

/// Values of the sample sites of a prior run, or None if the draw falls
/// outside the model domain.
fn prior_draw<C: Calibration>(calib: &C, rng: &mut SmallRng) -> Result<Option<ParamSet>> {
    let mut trace = Trace::prior(rng);
    match calib.calibration(&mut trace) {
        Ok(()) => Ok(Some(trace.sampled())),
        Err(e) if e.is_domain_error() => {
            trace!("prior draw rejected: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
