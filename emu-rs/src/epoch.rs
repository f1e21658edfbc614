use crate::Time;
use chrono::{Duration, NaiveDate};
use getset::CopyGetters;
use serde::{Deserialize, Serialize};

/// Converts between calendar dates and integer model time.
///
/// Model time counts whole days from the reference date, so the reference
/// date itself is time zero and earlier dates map to negative times.
#[derive(Debug, Copy, Clone, PartialEq, Eq, CopyGetters, Serialize, Deserialize)]
pub struct Epoch {
    #[getset(get_copy = "pub")]
    ref_date: NaiveDate,
}

impl Epoch {
    pub fn new(ref_date: NaiveDate) -> Self {
        Epoch { ref_date }
    }

    /// Date corresponding to model time t.
    pub fn index_to_date(&self, t: Time) -> NaiveDate {
        self.ref_date + Duration::days(t)
    }

    /// Model time corresponding to a calendar date.
    pub fn date_to_index(&self, date: NaiveDate) -> Time {
        (date - self.ref_date).num_days()
    }

    /// Map a sequence of model times to dates.
    pub fn index_to_dates(&self, times: &[Time]) -> Vec<NaiveDate> {
        times.iter().map(|&t| self.index_to_date(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_both_ways() {
        let ref_date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let epoch = Epoch::new(ref_date);
        let date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        assert_eq!(epoch.date_to_index(date), 59);
        assert_eq!(epoch.index_to_date(59), date);
        assert_eq!(
            epoch.index_to_date(-1),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()
        );
    }
}
