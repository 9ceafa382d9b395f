mod config;
mod constants;
mod data;
pub mod metrics;
mod schedule;
mod snapshot;
mod stats;
mod threshold;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use schedule::*;
pub use snapshot::*;
pub use stats::*;
pub use threshold::*;
