use crate::{error::EmuError, Real, Result};
use chrono::NaiveDate;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::{io, path::Path};

/// A date-indexed series of observations, usually daily case notifications.
///
/// Dates are kept in chronological order and are unique.
#[derive(Debug, Clone, PartialEq, Default, Getters)]
#[getset(get = "pub")]
pub struct Series {
    dates: Vec<NaiveDate>,
    values: Vec<Real>,
}

#[derive(Deserialize, Serialize, Debug)]
struct SeriesRow {
    date: NaiveDate,
    value: Real,
}

impl Series {
    /// Create series from (date, value) pairs in any order.
    pub fn new(pairs: impl IntoIterator<Item = (NaiveDate, Real)>) -> Result<Self> {
        let mut pairs: Vec<_> = pairs.into_iter().collect();
        pairs.sort_by_key(|(d, _)| *d);
        for w in pairs.windows(2) {
            if w[0].0 == w[1].0 {
                return Err(EmuError::DuplicateDate(w[0].0));
            }
        }
        let (dates, values) = pairs.into_iter().unzip();
        Ok(Series { dates, values })
    }

    /// Daily series starting at the given date.
    pub fn daily(start: NaiveDate, values: &[Real]) -> Self {
        Series {
            dates: start.iter_days().take(values.len()).collect(),
            values: values.to_vec(),
        }
    }

    /// Read series from CSV data with a `date,value` header.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut pairs = Vec::new();
        for res in reader.deserialize() {
            let row: SeriesRow = res?;
            pairs.push((row.date, row.value));
        }
        Series::new(pairs)
    }

    /// Read series from a CSV file with a `date,value` header.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Series::from_reader(file)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Iterate over (date, value) pairs in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Real)> + '_ {
        self.dates.iter().cloned().zip(self.values.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 2, d).unwrap()
    }

    #[test]
    fn sorts_and_rejects_duplicates() {
        let s = Series::new(vec![(day(3), 3.0), (day(1), 1.0), (day(2), 2.0)]).unwrap();
        assert_eq!(s.values(), &vec![1.0, 2.0, 3.0]);
        assert_eq!(s.dates(), &vec![day(1), day(2), day(3)]);

        let err = Series::new(vec![(day(1), 1.0), (day(1), 2.0)]).unwrap_err();
        assert!(matches!(err, EmuError::DuplicateDate(d) if d == day(1)));
    }

    #[test]
    fn reads_csv() {
        let data = "date,value\n2022-02-02,5\n2022-02-01,4.5\n";
        let s = Series::from_reader(data.as_bytes()).unwrap();
        assert_eq!(s.dates(), &vec![day(1), day(2)]);
        assert_eq!(s.values(), &vec![4.5, 5.0]);
    }
}
