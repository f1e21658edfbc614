mod ascii_plot;
mod ma;
mod stats;
pub use ascii_plot::*;
pub use ma::*;
pub use stats::*;
