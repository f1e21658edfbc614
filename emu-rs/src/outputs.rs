//! Aggregation of simulated trajectories over posterior draws.
//!
//! Simulations for a set of draws are stacked in a [`SpaghettiTable`] with one
//! row per model time and one column per (channel, draw) pair. Quantiles over
//! draws then reduce it to a [`QuantileSummary`] with one column per
//! (channel, level) pair.
use crate::{
    calibration::StandardCalib,
    error::EmuError,
    params::ParamSet,
    renewal::{RenewalModel, RenewalOutput},
    utils::{check_levels, quantiles},
    Real, Result,
};
use chrono::NaiveDate;
use getset::{CopyGetters, Getters};
use log::*;
use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs::File, io, path::Path};

pub const DEFAULT_LEVELS: [Real; 3] = [0.05, 0.5, 0.95];

/// Trajectory kinds recorded for each draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Incidence,
    Suscept,
    ReproductionNumber,
    Process,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Incidence,
        Channel::Suscept,
        Channel::ReproductionNumber,
        Channel::Process,
    ];

    pub fn index(self) -> usize {
        match self {
            Channel::Incidence => 0,
            Channel::Suscept => 1,
            Channel::ReproductionNumber => 2,
            Channel::Process => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Incidence => "incidence",
            Channel::Suscept => "suscept",
            Channel::ReproductionNumber => "r_t",
            Channel::Process => "process",
        }
    }

    /// Incidence follows the smoothing flag of the calibration.
    fn values(self, out: &RenewalOutput, smoothing: bool) -> &[Real] {
        match self {
            Channel::Incidence => out.incidence_series(smoothing),
            Channel::Suscept => out.suscept(),
            Channel::ReproductionNumber => out.r_t(),
            Channel::Process => out.process(),
        }
    }
}

/// Simulated trajectories, T rows by 4N columns. Column `c * N + j` holds
/// channel `c` of draw `j`.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct SpaghettiTable {
    #[getset(get = "pub")]
    dates: Vec<NaiveDate>,
    #[getset(get_copy = "pub")]
    n_draws: usize,
    #[getset(get = "pub")]
    data: Array2<Real>,
}

impl SpaghettiTable {
    /// Stack simulation outputs. Every output must cover all dates.
    pub fn from_outputs(dates: Vec<NaiveDate>, outputs: &[RenewalOutput], smoothing: bool) -> Result<Self> {
        let n = outputs.len();
        let mut data: Array2<Real> = Array2::zeros((dates.len(), Channel::ALL.len() * n));
        for (j, out) in outputs.iter().enumerate() {
            for &channel in Channel::ALL.iter() {
                let values = channel.values(out, smoothing);
                if values.len() != dates.len() {
                    return Err(EmuError::DimensionMismatch {
                        name: channel.name().to_string(),
                        expected: dates.len(),
                        found: values.len(),
                    });
                }
                data.column_mut(channel.index() * n + j)
                    .assign(&ArrayView1::from(values));
            }
        }
        Ok(SpaghettiTable { dates, n_draws: n, data })
    }

    pub fn n_times(&self) -> usize {
        self.dates.len()
    }

    /// All draws of a channel, T × N.
    pub fn channel(&self, channel: Channel) -> ArrayView2<Real> {
        let n = self.n_draws;
        let c = channel.index();
        self.data.slice(s![.., c * n..(c + 1) * n])
    }

    /// Per-time quantiles across draws for every channel.
    pub fn quantiles(&self, levels: &[Real]) -> Result<QuantileSummary> {
        check_levels(levels)?;
        if self.n_draws == 0 {
            warn!("no draws to summarize, quantiles are undefined");
        }
        let q = levels.len();
        let mut data: Array2<Real> = Array2::zeros((self.n_times(), Channel::ALL.len() * q));
        for &channel in Channel::ALL.iter() {
            let c = channel.index();
            for (t, row) in self.channel(channel).outer_iter().enumerate() {
                let qs = quantiles(&row.to_vec(), levels)?;
                data.slice_mut(s![t, c * q..(c + 1) * q])
                    .assign(&ArrayView1::from(&qs[..]));
            }
        }
        Ok(QuantileSummary {
            dates: self.dates.clone(),
            levels: levels.to_vec(),
            data,
        })
    }
}

/// Quantile bands, T rows by 4Q columns. Column `c * Q + k` holds level `k`
/// of channel `c`.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct QuantileSummary {
    dates: Vec<NaiveDate>,
    levels: Vec<Real>,
    data: Array2<Real>,
}

impl QuantileSummary {
    fn level_index(&self, level: Real) -> Result<usize> {
        self.levels
            .iter()
            .position(|&l| (l - level).abs() < 1e-9)
            .ok_or(EmuError::InvalidQuantile(level))
    }

    /// A single quantile of a channel over time.
    pub fn band(&self, channel: Channel, level: Real) -> Result<ArrayView1<Real>> {
        let k = self.level_index(level)?;
        Ok(self.data.column(channel.index() * self.levels.len() + k))
    }

    fn header(&self) -> Vec<String> {
        let mut head = vec!["date".to_string()];
        for channel in Channel::ALL.iter() {
            for level in self.levels.iter() {
                head.push(format!("{}_{}", channel.name(), level));
            }
        }
        head
    }

    /// Write one row per date, with a column per channel and level.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.header())?;
        for (date, row) in self.dates.iter().zip(self.data.outer_iter()) {
            let mut record = vec![date.to_string()];
            record.extend(row.iter().map(|x| x.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("writing {} quantile rows to {}", self.dates.len(), path.display());
        self.write_csv(File::create(path)?)
    }
}

/// Run the model of a calibration for every draw, in parallel.
pub fn simulate_draws<M: RenewalModel>(calib: &StandardCalib<M>, draws: &[ParamSet]) -> Result<SpaghettiTable> {
    let model = calib.epi_model();
    let dates = model.epoch().index_to_dates(model.model_times());
    debug!("simulating {} draws over {} model times", draws.len(), dates.len());
    let outputs = draws
        .par_iter()
        .map(|draw| calib.simulate(draw))
        .collect::<Result<Vec<_>>>()?;
    SpaghettiTable::from_outputs(dates, &outputs, calib.smoothing())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        renewal::{ModelConfig, SimpleRenewal},
        series::Series,
    };
    use assert_approx_eq::assert_approx_eq;
    use std::collections::BTreeMap;

    fn calib(smoothing: bool) -> StandardCalib<SimpleRenewal> {
        let date = |m, d| NaiveDate::from_ymd_opt(2021, m, d).unwrap();
        let model = SimpleRenewal::new(&ModelConfig {
            ref_date: date(1, 1),
            start: date(2, 1),
            end: date(2, 20),
            run_in: 10,
            proc_update_freq: 10,
            population: 1e5,
            gen_window: 20,
        })
        .unwrap();
        let data = Series::daily(date(2, 1), &[10.0; 20]);
        let fixed = ParamSet::new().with("gen_sd", 2.0).with("cdr", 0.5);
        StandardCalib::new(model, &data, BTreeMap::new(), vec![5.0; 7], fixed).with_smoothing(smoothing)
    }

    fn draws(c: &StandardCalib<SimpleRenewal>) -> Vec<ParamSet> {
        let n = c.n_process_periods();
        (0..5)
            .map(|i| {
                ParamSet::new()
                    .with("gen_mean", 4.0 + 0.5 * i as Real)
                    .with("rt0", 0.8 + 0.2 * i as Real)
                    .with("proc", vec![0.05 * i as Real; n])
            })
            .collect()
    }

    #[test]
    fn table_shape_and_layout() {
        let c = calib(false);
        let ds = draws(&c);
        let table = simulate_draws(&c, &ds).unwrap();
        assert_eq!(table.n_times(), 30);
        assert_eq!(table.data().dim(), (30, 4 * ds.len()));

        let out = c.simulate(&ds[2]).unwrap();
        let rt = table.channel(Channel::ReproductionNumber);
        assert_eq!(rt.dim(), (30, 5));
        assert_approx_eq!(rt[[7, 2]], out.r_t()[7]);
        assert_approx_eq!(table.channel(Channel::Incidence)[[12, 2]], out.incidence()[12]);
    }

    #[test]
    fn smoothed_incidence_channel() {
        let c = calib(true);
        let ds = draws(&c);
        let table = simulate_draws(&c, &ds).unwrap();
        let out = c.simulate(&ds[1]).unwrap();
        assert_approx_eq!(table.channel(Channel::Incidence)[[3, 1]], out.incidence_ma7()[3]);
    }

    #[test]
    fn median_between_min_and_max() {
        let c = calib(false);
        let table = simulate_draws(&c, &draws(&c)).unwrap();
        let summary = table.quantiles(&[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(summary.data().dim(), (30, 12));
        for &channel in Channel::ALL.iter() {
            let lo = summary.band(channel, 0.0).unwrap();
            let mid = summary.band(channel, 0.5).unwrap();
            let hi = summary.band(channel, 1.0).unwrap();
            for t in 0..summary.dates().len() {
                assert!(lo[t] <= mid[t] && mid[t] <= hi[t], "{:?} at {}", channel, t);
            }
        }
    }

    #[test]
    fn invalid_levels_are_rejected() {
        let c = calib(false);
        let table = simulate_draws(&c, &draws(&c)).unwrap();
        assert!(matches!(table.quantiles(&[0.5, 1.2]), Err(EmuError::InvalidQuantile(_))));

        let summary = table.quantiles(&DEFAULT_LEVELS).unwrap();
        assert!(matches!(
            summary.band(Channel::Process, 0.25),
            Err(EmuError::InvalidQuantile(_))
        ));
    }

    #[test]
    fn csv_has_header_and_one_row_per_date() {
        let c = calib(false);
        let summary = simulate_draws(&c, &draws(&c)).unwrap().quantiles(&[0.5]).unwrap();
        let mut buf = Vec::new();
        summary.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 31);
        assert_eq!(lines[0], "date,incidence_0.5,suscept_0.5,r_t_0.5,process_0.5");
        assert!(lines[1].starts_with("2021-01-22,"));
    }
}
