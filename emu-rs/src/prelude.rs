pub use crate::calibration::{align, Alignment, Calibration, StandardCalib};
pub use crate::epoch::Epoch;
pub use crate::error::{EmuError, Result};
pub use crate::mcmc::{Metropolis, Posterior};
pub use crate::outputs::{simulate_draws, Channel, QuantileSummary, SpaghettiTable};
pub use crate::params::{ParamSet, ParamValue};
pub use crate::priors::{Prior, PriorSpec};
pub use crate::renewal::{RenewalModel, RenewalOutput, RenewalParams, SimpleRenewal};
pub use crate::series::Series;
pub use crate::trace::Trace;
pub use crate::{Real, Time};
