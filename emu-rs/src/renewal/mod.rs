//! Renewal-equation epidemic models.
//!
//! A renewal model computes incidence at each time step from past incidence
//! weighted by the generation-time distribution and scaled by a reproduction
//! number. Calibration only needs the [`RenewalModel`] trait; [`SimpleRenewal`]
//! is the concrete model used by the command line driver.
mod gen_time;
mod simple;

pub use gen_time::*;
pub use simple::*;

use crate::{epoch::Epoch, Real, Result, Time};
use getset::Getters;
use serde::{Deserialize, Serialize};

/// Epidemiological parameters consumed by a single simulation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenewalParams {
    /// Mean of the generation time, in days.
    pub gen_mean: Real,
    /// Standard deviation of the generation time, in days.
    pub gen_sd: Real,
    /// Relative change of transmission potential for each process period.
    pub proc: Vec<Real>,
    /// Incidence before the first model time, oldest first.
    pub init_window: Vec<Real>,
    /// Reproduction number when the process is at its baseline level.
    pub rt0: Real,
}

/// Trajectories produced by a single simulation. Every vector has one value
/// per model time.
#[derive(Debug, Clone, PartialEq, Default, Getters, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct RenewalOutput {
    pub(crate) incidence: Vec<Real>,
    pub(crate) incidence_ma7: Vec<Real>,
    pub(crate) suscept: Vec<Real>,
    pub(crate) r_t: Vec<Real>,
    pub(crate) process: Vec<Real>,
}

impl RenewalOutput {
    /// Raw or 7-day smoothed incidence.
    pub fn incidence_series(&self, smoothing: bool) -> &[Real] {
        if smoothing {
            &self.incidence_ma7
        } else {
            &self.incidence
        }
    }

    pub fn len(&self) -> usize {
        self.incidence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidence.is_empty()
    }
}

/// Interface calibration expects from an epidemic model.
pub trait RenewalModel: Sync {
    /// Date converter for the model time axis.
    fn epoch(&self) -> &Epoch;

    /// All simulated times, consecutive and ascending.
    fn model_times(&self) -> &[Time];

    /// Times compared against data. A suffix of model_times.
    fn analysis_times(&self) -> &[Time];

    /// Number of periods of the variable process.
    fn n_process_periods(&self) -> usize;

    /// Run a simulation.
    fn renew(&self, params: &RenewalParams) -> Result<RenewalOutput>;
}
