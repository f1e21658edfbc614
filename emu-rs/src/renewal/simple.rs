use super::{gen_time_density, RenewalModel, RenewalOutput, RenewalParams};
use crate::{epoch::Epoch, error::EmuError, utils::moving_average, Real, Result, Time};
use chrono::NaiveDate;
use getset::CopyGetters;
use log::*;
use serde::{Deserialize, Serialize};

/// Days in the smoothing window of `incidence_ma7`.
const MA_WINDOW: usize = 7;

/// Settings of a [`SimpleRenewal`] model.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Date of model time zero.
    pub ref_date: NaiveDate,
    /// First date compared against data.
    pub start: NaiveDate,
    /// Last simulated date.
    pub end: NaiveDate,
    /// Days simulated before `start` and excluded from the analysis.
    pub run_in: u32,
    /// Length of each period of the variable process, in days.
    pub proc_update_freq: u32,
    /// Size of the population at risk.
    pub population: Real,
    /// Number of days covered by the generation-time distribution.
    pub gen_window: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let date = |m, d| NaiveDate::from_ymd_opt(2021, m, d).unwrap_or(NaiveDate::MIN);
        ModelConfig {
            ref_date: date(1, 1),
            start: date(3, 1),
            end: date(6, 30),
            run_in: 28,
            proc_update_freq: 14,
            population: 1e6,
            gen_window: 40,
        }
    }
}

/// A renewal model with susceptible depletion and a piecewise constant
/// variable process.
///
/// The transmission potential at time t is `exp(cumsum(proc)[period(t)])`, so
/// every component of the process vector is the log-relative change from the
/// previous period. The effective reproduction number is
/// `rt0 * potential * S / N`.
#[derive(Debug, Clone, PartialEq, CopyGetters)]
pub struct SimpleRenewal {
    epoch: Epoch,
    model_times: Vec<Time>,
    analysis_times: Vec<Time>,
    #[getset(get_copy = "pub")]
    proc_update_freq: usize,
    #[getset(get_copy = "pub")]
    population: Real,
    #[getset(get_copy = "pub")]
    gen_window: usize,
}

impl SimpleRenewal {
    pub fn new(cfg: &ModelConfig) -> Result<Self> {
        if cfg.end < cfg.start {
            return Err(EmuError::InvalidConfig(format!(
                "model end {} precedes start {}",
                cfg.end, cfg.start
            )));
        }
        if cfg.proc_update_freq == 0 {
            return Err(EmuError::InvalidConfig("proc_update_freq must be positive".into()));
        }
        if !(cfg.population > 0.0) {
            return Err(EmuError::InvalidConfig("population must be positive".into()));
        }
        if cfg.gen_window == 0 {
            return Err(EmuError::InvalidConfig("gen_window must be positive".into()));
        }

        let epoch = Epoch::new(cfg.ref_date);
        let start = epoch.date_to_index(cfg.start);
        let end = epoch.date_to_index(cfg.end);
        let model = SimpleRenewal {
            epoch,
            model_times: (start - cfg.run_in as Time..=end).collect(),
            analysis_times: (start..=end).collect(),
            proc_update_freq: cfg.proc_update_freq as usize,
            population: cfg.population,
            gen_window: cfg.gen_window,
        };
        info!(
            "renewal model: {} model times, {} analysis times, {} process periods",
            model.model_times.len(),
            model.analysis_times.len(),
            model.n_process_periods()
        );
        Ok(model)
    }

    /// Transmission potential for each model time.
    pub fn process_values(&self, proc: &[Real]) -> Result<Vec<Real>> {
        let n = self.n_process_periods();
        if proc.len() != n {
            return Err(EmuError::DimensionMismatch {
                name: "proc".to_string(),
                expected: n,
                found: proc.len(),
            });
        }
        let cumulative: Vec<Real> = proc
            .iter()
            .scan(0.0, |acc, x| {
                *acc += x;
                Some(*acc)
            })
            .collect();
        Ok((0..self.model_times.len())
            .map(|i| cumulative[i / self.proc_update_freq].exp())
            .collect())
    }
}

impl RenewalModel for SimpleRenewal {
    fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    fn model_times(&self) -> &[Time] {
        &self.model_times
    }

    fn analysis_times(&self) -> &[Time] {
        &self.analysis_times
    }

    fn n_process_periods(&self) -> usize {
        (self.model_times.len() + self.proc_update_freq - 1) / self.proc_update_freq
    }

    fn renew(&self, params: &RenewalParams) -> Result<RenewalOutput> {
        let process = self.process_values(&params.proc)?;
        let density = gen_time_density(params.gen_mean, params.gen_sd, self.gen_window)?;
        if params.init_window.is_empty() {
            return Err(EmuError::invalid_input("init_window", "no seeding values"));
        }

        let n = self.model_times.len();
        let n_init = params.init_window.len();
        let mut history = Vec::with_capacity(n_init + n);
        history.extend_from_slice(&params.init_window);

        let mut out = RenewalOutput {
            incidence: Vec::with_capacity(n),
            incidence_ma7: Vec::new(),
            suscept: Vec::with_capacity(n),
            r_t: Vec::with_capacity(n),
            process,
        };

        let mut suscept = self.population - params.init_window.iter().sum::<Real>();
        suscept = suscept.max(0.0);
        for i in 0..n {
            let r_t = params.rt0 * out.process[i] * suscept / self.population;
            let force: Real = density
                .iter()
                .zip(history.iter().rev())
                .map(|(w, inc)| w * inc)
                .sum();
            let incidence = (r_t * force).min(suscept);
            suscept = (suscept - incidence).max(0.0);

            history.push(incidence);
            out.incidence.push(incidence);
            out.suscept.push(suscept);
            out.r_t.push(r_t);
        }
        out.incidence_ma7 = moving_average(&params.init_window, &out.incidence, MA_WINDOW);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn model() -> SimpleRenewal {
        let date = |m, d| NaiveDate::from_ymd_opt(2021, m, d).unwrap();
        SimpleRenewal::new(&ModelConfig {
            ref_date: date(1, 1),
            start: date(2, 1),
            end: date(2, 28),
            run_in: 14,
            proc_update_freq: 7,
            population: 1e5,
            gen_window: 20,
        })
        .unwrap()
    }

    fn params(model: &SimpleRenewal, rt0: Real) -> RenewalParams {
        RenewalParams {
            gen_mean: 5.0,
            gen_sd: 2.0,
            proc: vec![0.0; model.n_process_periods()],
            init_window: vec![10.0; 14],
            rt0,
        }
    }

    #[test]
    fn time_axes() {
        let m = model();
        assert_eq!(m.model_times().len(), 42);
        assert_eq!(m.analysis_times().len(), 28);
        assert_eq!(m.model_times()[0], 31 - 14);
        assert_eq!(m.analysis_times()[0], 31);
        assert_eq!(m.n_process_periods(), 6);
    }

    #[test]
    fn constant_incidence_at_threshold() {
        let m = model();
        let mut p = params(&m, 1.0);
        // Seeding is negligible against the population.
        p.init_window = vec![1e-6; 20];
        let out = m.renew(&p).unwrap();
        assert_eq!(out.len(), 42);
        for x in out.incidence().iter() {
            assert_approx_eq!(*x, 1e-6, 1e-9);
        }
    }

    #[test]
    fn growth_and_depletion() {
        let m = model();
        let out = m.renew(&params(&m, 2.5)).unwrap();
        assert!(out.incidence()[20] > out.incidence()[0]);
        assert!(out.suscept().windows(2).all(|w| w[1] <= w[0]));
        assert!(out.r_t()[41] < 2.5);
        assert!(out.incidence_ma7().iter().zip(out.incidence()).any(|(a, b)| a != b));
    }

    #[test]
    fn process_is_relative_to_previous_period() {
        let m = model();
        let v = m.process_values(&[0.0, 0.5, -0.5, 0.0, 0.0, 1.0]).unwrap();
        assert_approx_eq!(v[0], 1.0);
        assert_approx_eq!(v[7], (0.5 as Real).exp());
        assert_approx_eq!(v[14], 1.0);
        assert_approx_eq!(v[41], (1.0 as Real).exp());
    }

    #[test]
    fn rejects_wrong_process_length() {
        let m = model();
        let mut p = params(&m, 1.0);
        p.proc = vec![0.0; 5];
        assert!(matches!(
            m.renew(&p),
            Err(EmuError::DimensionMismatch { expected: 6, found: 5, .. })
        ));
        p.proc = vec![0.0; 7];
        assert!(matches!(m.renew(&p), Err(EmuError::DimensionMismatch { .. })));
    }
}
