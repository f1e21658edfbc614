//! Calibration of renewal-equation epidemic models against observed case
//! notifications.
//!
//! The crate binds priors, a likelihood and a mechanistic renewal model into a
//! log-probability program that can be explored by the bundled Metropolis
//! sampler, and summarizes posterior simulations as quantile bands.
pub mod calibration;
pub mod config;
pub mod epoch;
pub mod error;
pub mod mcmc;
pub mod outputs;
pub mod params;
pub mod prelude;
pub mod priors;
pub mod renewal;
pub mod series;
pub mod trace;
pub mod utils;

pub use crate::calibration::{Calibration, StandardCalib};
pub use crate::error::{EmuError, Result};
pub use crate::renewal::{RenewalModel, SimpleRenewal};

/// Basic representation of time. Model time is measured in whole days since
/// the reference date of an [`epoch::Epoch`] and may be negative.
pub type Time = i64;

/// Base Real type used by this crate. Uses an alias to easily change precision
/// if necessary.
pub type Real = f64;
pub(crate) const INF: Real = Real::INFINITY;
pub(crate) const NAN: Real = Real::NAN;
