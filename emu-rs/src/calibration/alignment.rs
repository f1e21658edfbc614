use crate::{epoch::Epoch, series::Series, Real, Time};
use chrono::NaiveDate;
use getset::Getters;
use log::*;
use std::collections::BTreeSet;

/// Observed data restricted to the analysis window, together with the
/// offsets of each retained date into the model's time array.
#[derive(Debug, Clone, PartialEq, Default, Getters)]
#[getset(get = "pub")]
pub struct Alignment {
    dates: Vec<NaiveDate>,
    data: Vec<Real>,
    model_idx: Vec<usize>,
}

impl Alignment {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Intersect the observed series with the analysis times of a model.
///
/// The result preserves chronological order. Offsets are the model times of
/// the common dates minus the first model time, so they can index simulated
/// trajectories directly.
pub fn align(epoch: &Epoch, model_times: &[Time], analysis_times: &[Time], series: &Series) -> Alignment {
    let first = match model_times.first() {
        Some(&t) => t,
        None => {
            warn!("model has no simulated times, analysis window is empty");
            return Alignment::default();
        }
    };
    let last = model_times[model_times.len() - 1];
    let analysis: BTreeSet<NaiveDate> = epoch
        .index_to_dates(analysis_times)
        .into_iter()
        .filter(|d| {
            let t = epoch.date_to_index(*d);
            t >= first && t <= last
        })
        .collect();

    let mut out = Alignment::default();
    for (date, value) in series.iter().filter(|(d, _)| analysis.contains(d)) {
        out.dates.push(date);
        out.data.push(value);
        out.model_idx.push((epoch.date_to_index(date) - first) as usize);
    }

    if out.is_empty() {
        warn!("observed series does not overlap the analysis window");
    } else {
        debug!(
            "analysis window: {} to {} ({} points)",
            out.dates[0],
            out.dates[out.len() - 1],
            out.len()
        );
    }
    out
}
