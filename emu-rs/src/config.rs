//! TOML configuration of a calibration run.
//!
//! ```toml
//! data = "notifications.csv"
//! output = "quantiles.csv"
//! smoothing = true
//!
//! [model]
//! start = "2021-03-01"
//! end = "2021-06-30"
//!
//! [fixed_params]
//! rt0 = 2.5
//!
//! [priors]
//! gen_mean = { family = "Gamma", args = [25.0, 5.0] }
//! cdr = { family = "Beta", kwargs = { concentration1 = 4.0, concentration0 = 8.0 } }
//!
//! [sampler]
//! chains = 4
//! ```
use crate::{
    calibration::{align, StandardCalib},
    error::EmuError,
    mcmc::Metropolis,
    outputs::DEFAULT_LEVELS,
    params::ParamSet,
    priors::Prior,
    renewal::{ModelConfig, RenewalModel, SimpleRenewal},
    series::Series,
    Real, Result,
};
use log::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, str::FromStr};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CalibConfig {
    /// CSV file with `date,value` rows of observed notifications.
    pub data: String,
    /// Destination of the quantile summary.
    pub output: String,
    pub smoothing: bool,
    pub data_dispersion_sd: Real,
    pub process_dispersion_sd: Real,
    /// Notifications preceding the first model time. Defaults to the first
    /// observation inside the model range, repeated over a week.
    pub init_data: Option<Vec<Real>>,
    pub model: ModelConfig,
    pub fixed_params: ParamSet,
    pub priors: BTreeMap<String, Prior>,
    pub sampler: Metropolis,
    pub quantiles: Vec<Real>,
    /// Number of posterior draws simulated for the summary. All when absent.
    pub n_simulated: Option<usize>,
}

impl Default for CalibConfig {
    fn default() -> Self {
        CalibConfig {
            data: "notifications.csv".to_string(),
            output: "quantiles.csv".to_string(),
            smoothing: false,
            data_dispersion_sd: 1.0,
            process_dispersion_sd: 1.0,
            init_data: None,
            model: ModelConfig::default(),
            fixed_params: ParamSet::new(),
            priors: BTreeMap::new(),
            sampler: Metropolis::default(),
            quantiles: DEFAULT_LEVELS.to_vec(),
            n_simulated: None,
        }
    }
}

impl FromStr for CalibConfig {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl CalibConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        fs::read_to_string(path)?.parse()
    }

    /// Build the model and bind it to an observed series.
    pub fn build(&self, data: &Series) -> Result<StandardCalib<SimpleRenewal>> {
        let model = SimpleRenewal::new(&self.model)?;
        let init_data = match &self.init_data {
            Some(values) => values.clone(),
            None => default_init_data(&model, data)?,
        };
        for name in self.priors.keys() {
            if self.fixed_params.contains(name) {
                warn!("'{}' is both fixed and sampled, the sampled value wins", name);
            }
        }
        StandardCalib::new(model, data, self.priors.clone(), init_data, self.fixed_params.clone())
            .with_smoothing(self.smoothing)
            .with_data_dispersion_sd(self.data_dispersion_sd)?
            .with_process_dispersion_sd(self.process_dispersion_sd)
    }

    /// Load the observed series and build the calibration.
    pub fn load(&self) -> Result<StandardCalib<SimpleRenewal>> {
        let data = Series::from_path(&self.data)?;
        info!("read {} observations from {}", data.len(), self.data);
        self.build(&data)
    }
}

fn default_init_data<M: RenewalModel>(model: &M, data: &Series) -> Result<Vec<Real>> {
    let window = align(model.epoch(), model.model_times(), model.model_times(), data);
    match window.data().first() {
        Some(&x) => Ok(vec![x; 7]),
        None => Err(EmuError::InvalidConfig(
            "init_data is not set and the data do not overlap the model times".into(),
        )),
    }
}
