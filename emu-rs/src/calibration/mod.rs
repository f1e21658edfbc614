//! Bayesian calibration of renewal models against case notifications.
//!
//! A [`Calibration`] is a log-probability program: it declares its random
//! variables and likelihood on a [`Trace`], which either draws from the priors
//! or replays values proposed by a sampler.
mod alignment;

pub use alignment::*;

use crate::{
    error::EmuError,
    params::ParamSet,
    priors::Prior,
    renewal::{RenewalModel, RenewalOutput, RenewalParams},
    series::Series,
    trace::Trace,
    Real, Result,
};
use getset::{CopyGetters, Getters};
use log::*;
use statrs::distribution::{Continuous, Normal};
use std::collections::BTreeMap;

/// A calibration procedure that can be explored by a sampler.
pub trait Calibration: Sync {
    /// Declare all random variables and likelihood terms on the trace.
    fn calibration(&self, trace: &mut Trace) -> Result<()>;

    /// Human readable summary of the calibration approach.
    fn description(&self) -> String;
}

/// Epidemic model bound to the data it is calibrated against.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct CalibrationTarget<M> {
    #[getset(get = "pub")]
    epi_model: M,
    #[getset(get_copy = "pub")]
    n_process_periods: usize,
    #[getset(get = "pub")]
    alignment: Alignment,
}

impl<M: RenewalModel> CalibrationTarget<M> {
    pub fn new(epi_model: M, data: &Series) -> Self {
        let alignment = align(
            epi_model.epoch(),
            epi_model.model_times(),
            epi_model.analysis_times(),
            data,
        );
        if alignment.data().iter().any(|&x| !(x > 0.0)) {
            warn!("observed data has non-positive values, log-likelihood will not be finite");
        }
        CalibrationTarget {
            n_process_periods: epi_model.n_process_periods(),
            epi_model,
            alignment,
        }
    }

    /// Observed values inside the analysis window.
    pub fn data(&self) -> &[Real] {
        self.alignment.data()
    }

    /// Offsets of the analysis window into simulated trajectories.
    pub fn model_idx(&self) -> &[usize] {
        self.alignment.model_idx()
    }
}

/// Sum of normal log-densities of the log observations around the log of the
/// modelled values.
///
/// Non-positive inputs are not guarded: their logarithm propagates as -inf or
/// NaN into the result.
pub fn notifications_log_likelihood(modelled: &[Real], observed: &[Real], dispersion: Real) -> Result<Real> {
    if modelled.len() != observed.len() {
        return Err(EmuError::DimensionMismatch {
            name: "notifications".to_string(),
            expected: observed.len(),
            found: modelled.len(),
        });
    }
    let normal = Normal::new(0.0, dispersion).map_err(|e| EmuError::invalid_input("dispersion", e))?;
    Ok(modelled
        .iter()
        .zip(observed)
        .map(|(m, o)| normal.ln_pdf(o.ln() - m.ln()))
        .sum())
}

/// The standard calibration: priors for the epidemiological parameters, a
/// random-walk variable process with calibrated dispersion and a log-normal
/// likelihood for notifications.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct StandardCalib<M> {
    #[getset(get = "pub")]
    target: CalibrationTarget<M>,
    #[getset(get = "pub")]
    priors: BTreeMap<String, Prior>,
    #[getset(get = "pub")]
    init_data: Vec<Real>,
    #[getset(get = "pub")]
    fixed_params: ParamSet,
    #[getset(get_copy = "pub")]
    data_disp_sd: Real,
    #[getset(get_copy = "pub")]
    proc_disp_sd: Real,
    #[getset(get_copy = "pub")]
    smoothing: bool,
}

impl<M: RenewalModel> StandardCalib<M> {
    /// Bind model and data. Dispersion priors default to half-normal with unit
    /// scale and smoothing is off.
    pub fn new(
        epi_model: M,
        data: &Series,
        priors: BTreeMap<String, Prior>,
        init_data: Vec<Real>,
        fixed_params: ParamSet,
    ) -> Self {
        let target = CalibrationTarget::new(epi_model, data);
        info!(
            "calibrating {} priors and {} process periods against {} observations",
            priors.len(),
            target.n_process_periods(),
            target.data().len()
        );
        StandardCalib {
            target,
            priors,
            init_data,
            fixed_params,
            data_disp_sd: 1.0,
            proc_disp_sd: 1.0,
            smoothing: false,
        }
    }

    /// Scale of the half-normal prior of the data dispersion.
    pub fn with_data_dispersion_sd(mut self, sd: Real) -> Result<Self> {
        Prior::HalfNormal { scale: sd }.validate()?;
        self.data_disp_sd = sd;
        Ok(self)
    }

    /// Scale of the half-normal prior of the process dispersion.
    pub fn with_process_dispersion_sd(mut self, sd: Real) -> Result<Self> {
        Prior::HalfNormal { scale: sd }.validate()?;
        self.proc_disp_sd = sd;
        Ok(self)
    }

    /// Compare 7-day smoothed incidence instead of raw incidence.
    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn epi_model(&self) -> &M {
        self.target.epi_model()
    }

    pub fn n_process_periods(&self) -> usize {
        self.target.n_process_periods()
    }

    /// Seeding incidence implied by the initial data and a detection ratio.
    pub fn init_window(&self, cdr: Real) -> Vec<Real> {
        self.init_data.iter().map(|x| x / cdr).collect()
    }

    /// Fixed parameters, a sampled draw and the derived initial window.
    pub fn complete_params(&self, draw: &ParamSet) -> Result<ParamSet> {
        let mut params = self.fixed_params.merged(draw);
        let cdr = params.scalar("cdr")?;
        params.insert("init_window", self.init_window(cdr));
        Ok(params)
    }

    /// Run the model for a sampled draw.
    pub fn simulate(&self, draw: &ParamSet) -> Result<RenewalOutput> {
        let params = self.complete_params(draw)?;
        self.target.epi_model().renew(&renewal_params(&params)?)
    }

    /// Modelled notifications inside the analysis window for a full parameter
    /// set: incidence (raw or smoothed) times the case detection ratio.
    pub fn get_model_notifications(&self, params: &ParamSet) -> Result<Vec<Real>> {
        let cdr = params.scalar("cdr")?;
        let out = self.target.epi_model().renew(&renewal_params(params)?)?;
        let incidence = out.incidence_series(self.smoothing);
        Ok(self.target.model_idx().iter().map(|&i| incidence[i] * cdr).collect())
    }
}

fn renewal_params(params: &ParamSet) -> Result<RenewalParams> {
    Ok(RenewalParams {
        gen_mean: params.scalar("gen_mean")?,
        gen_sd: params.scalar("gen_sd")?,
        proc: params.vector("proc")?.to_vec(),
        init_window: params.vector("init_window")?.to_vec(),
        rt0: params.scalar("rt0")?,
    })
}

impl<M: RenewalModel> Calibration for StandardCalib<M> {
    fn calibration(&self, trace: &mut Trace) -> Result<()> {
        let mut params = self.fixed_params.clone();
        for (name, prior) in self.priors.iter() {
            let x = trace.sample(name, prior)?;
            params.insert(name.as_str(), x);
        }

        let init_window = self.init_window(params.scalar("cdr")?);
        trace.deterministic("init_window", init_window.clone());
        params.insert("init_window", init_window);

        let proc_dispersion = trace.sample("proc_dispersion", &Prior::HalfNormal { scale: self.proc_disp_sd })?;
        let proc_prior = Prior::Normal {
            loc: 0.0,
            scale: proc_dispersion,
        };
        let proc = trace.sample_iid("proc", &proc_prior, self.n_process_periods())?;
        params.insert("proc", proc);

        let modelled = self.get_model_notifications(&params)?;
        if modelled.iter().any(|&x| !(x > 0.0)) {
            debug!("non-positive modelled notifications");
        }
        let dispersion = trace.sample("dispersion", &Prior::HalfNormal { scale: self.data_disp_sd })?;
        let like = notifications_log_likelihood(&modelled, self.target.data(), dispersion)?;
        trace.factor("notifications_ll", like);
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "The calibration process calibrates parameters for {} \
             values for periods of the variable process to the data. \
             The relative values pertaining to each period of the variable process \
             are estimated from normal prior distributions centred at no \
             change from the value of the previous stage of the process. \
             The dispersion of the variable process is calibrated, \
             using a half-normal distribution with scale {}. \
             The log of the modelled notification rate for each parameter set \
             is compared against the data from the end of the run-in phase \
             through to the end of the analysis. \
             Modelled notifications are calculated as the product of modelled {}incidence and the \
             (constant through time) case detection proportion. \
             The dispersion parameter for this comparison of log values is \
             also calibrated, using a half-normal distribution with scale {}. ",
            self.n_process_periods(),
            self.proc_disp_sd,
            if self.smoothing { "7-day smoothed " } else { "" },
            self.data_disp_sd,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        renewal::{ModelConfig, SimpleRenewal},
        trace::SiteKind,
    };
    use assert_approx_eq::assert_approx_eq;
    use chrono::NaiveDate;
    use rand::{rngs::SmallRng, SeedableRng};
    use std::f64::consts::PI;

    const INIT: [Real; 7] = [20.0; 7];

    fn model() -> SimpleRenewal {
        let date = |m, d| NaiveDate::from_ymd_opt(2021, m, d).unwrap();
        SimpleRenewal::new(&ModelConfig {
            ref_date: date(1, 1),
            start: date(3, 1),
            end: date(4, 10),
            run_in: 14,
            proc_update_freq: 10,
            population: 1e6,
            gen_window: 30,
        })
        .unwrap()
    }

    fn priors() -> BTreeMap<String, Prior> {
        let mut priors = BTreeMap::new();
        priors.insert("gen_mean".to_string(), Prior::Gamma { concentration: 25.0, rate: 5.0 });
        priors.insert("gen_sd".to_string(), Prior::Gamma { concentration: 16.0, rate: 8.0 });
        priors.insert("cdr".to_string(), Prior::Beta { concentration1: 4.0, concentration0: 8.0 });
        priors
    }

    fn truth(m: &SimpleRenewal) -> ParamSet {
        let cdr = 0.25;
        ParamSet::new()
            .with("gen_mean", 5.0)
            .with("gen_sd", 2.0)
            .with("cdr", cdr)
            .with("rt0", 1.4)
            .with("proc", vec![0.1; m.n_process_periods()])
            .with("proc_dispersion", 0.3)
            .with("dispersion", 0.2)
            .with("init_window", INIT.iter().map(|x| x / cdr).collect::<Vec<_>>())
    }

    /// Series equal to the notifications simulated with the true parameters.
    fn synthetic_series(smoothing: bool) -> Series {
        let m = model();
        let p = truth(&m);
        let renewal = RenewalParams {
            gen_mean: 5.0,
            gen_sd: 2.0,
            proc: p.vector("proc").unwrap().to_vec(),
            init_window: p.vector("init_window").unwrap().to_vec(),
            rt0: 1.4,
        };
        let out = m.renew(&renewal).unwrap();
        let notif: Vec<Real> = out.incidence_series(smoothing).iter().map(|x| x * 0.25).collect();
        let start = m.epoch().index_to_date(m.model_times()[0]);
        Series::daily(start, &notif)
    }

    fn calib(smoothing: bool) -> StandardCalib<SimpleRenewal> {
        let fixed = ParamSet::new().with("rt0", 1.4);
        StandardCalib::new(model(), &synthetic_series(smoothing), priors(), INIT.to_vec(), fixed)
            .with_smoothing(smoothing)
    }

    #[test]
    fn zero_residual_likelihood_is_analytic() {
        let sigma = 0.2;
        let n = 17;
        let ll = notifications_log_likelihood(&vec![3.0; n], &vec![3.0; n], sigma).unwrap();
        assert_approx_eq!(ll, -0.5 * (2.0 * PI * sigma * sigma).ln() * n as Real);
    }

    #[test]
    fn non_positive_values_give_non_finite_likelihood() {
        let zero_obs = notifications_log_likelihood(&[2.0, 3.0], &[0.0, 3.0], 0.5).unwrap();
        assert!(!zero_obs.is_finite());

        let negative_model = notifications_log_likelihood(&[-2.0, 3.0], &[2.0, 3.0], 0.5).unwrap();
        assert!(negative_model.is_nan());
    }

    #[test]
    fn factor_matches_analytic_value_for_exact_fit() {
        let c = calib(false);
        let n = c.target().data().len();
        assert_eq!(n, 41);

        let values = truth(c.epi_model());
        let mut trace = Trace::condition(&values);
        c.calibration(&mut trace).unwrap();
        let site = trace.site("notifications_ll").unwrap();
        assert_eq!(site.kind(), SiteKind::Factor);
        assert_approx_eq!(site.log_prob(), -0.5 * (2.0 * PI * 0.04 as Real).ln() * n as Real, 1e-6);
    }

    #[test]
    fn smoothing_switches_extraction_path() {
        let values = truth(&model());
        let raw = calib(false).get_model_notifications(&values).unwrap();
        let smooth = calib(true).get_model_notifications(&values).unwrap();
        assert_eq!(raw.len(), smooth.len());
        assert!(raw.iter().zip(smooth.iter()).any(|(a, b)| (a - b).abs() > 1e-9));

        let m = model();
        let out = m
            .renew(&RenewalParams {
                gen_mean: 5.0,
                gen_sd: 2.0,
                proc: values.vector("proc").unwrap().to_vec(),
                init_window: values.vector("init_window").unwrap().to_vec(),
                rt0: 1.4,
            })
            .unwrap();
        let idx = calib(true).target().model_idx().to_vec();
        assert_approx_eq!(smooth[0], out.incidence_ma7()[idx[0]] * 0.25);
        assert_approx_eq!(raw[0], out.incidence()[idx[0]] * 0.25);
    }

    #[test]
    fn wrong_process_length_fails() {
        let c = calib(false);
        let values = truth(c.epi_model()).with("proc", vec![0.0; c.n_process_periods() + 1]);
        let mut trace = Trace::condition(&values);
        assert!(matches!(
            c.calibration(&mut trace),
            Err(EmuError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn prior_run_declares_all_sites() {
        let c = calib(false);
        let mut rng = SmallRng::seed_from_u64(11);
        let mut trace = Trace::prior(&mut rng);
        c.calibration(&mut trace).unwrap();
        let sampled = trace.sampled();
        for name in ["cdr", "gen_mean", "gen_sd", "proc_dispersion", "proc", "dispersion"].iter() {
            assert!(sampled.contains(name), "missing {}", name);
        }
        assert!(!sampled.contains("rt0"));
        assert_eq!(sampled.vector("proc").unwrap().len(), c.n_process_periods());

        let cdr = sampled.scalar("cdr").unwrap();
        let init = trace.site("init_window").unwrap().value().as_slice().to_vec();
        assert_approx_eq!(init[0], INIT[0] / cdr);
    }

    #[test]
    fn missing_parameter_is_reported() {
        // rt0 is neither fixed nor given a prior.
        let c = StandardCalib::new(model(), &synthetic_series(false), priors(), INIT.to_vec(), ParamSet::new());
        let values = truth(c.epi_model());
        let mut trace = Trace::condition(&values);
        assert!(matches!(
            c.calibration(&mut trace),
            Err(EmuError::MissingParameter(name)) if name == "rt0"
        ));
    }

    #[test]
    fn disjoint_data_gives_empty_window() {
        let far = Series::daily(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &[1.0, 2.0]);
        let c = StandardCalib::new(model(), &far, priors(), INIT.to_vec(), ParamSet::new());
        assert!(c.target().alignment().is_empty());
    }

    #[test]
    fn description_mentions_periods() {
        let c = calib(true).with_data_dispersion_sd(0.5).unwrap();
        let text = c.description();
        assert!(text.contains(&format!("{} values", c.n_process_periods())));
        assert!(text.contains("7-day smoothed"));
        assert!(text.contains("scale 0.5"));
        assert!(calib(false).with_process_dispersion_sd(-1.0).is_err());
    }
}
