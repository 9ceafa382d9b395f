#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]


pub(crate) mod clock;
pub(crate) mod dispatcher;
pub(crate) mod evaluator;
pub(crate) mod pool;
pub(crate) mod sink;

mod error;

pub use error::Error;
pub use load_test::{ConfigurableLoadTest, LoadTest};

pub mod prelude {
    pub use crate::load_test::{ConfigurableLoadTest, LoadTest};
    pub use crate::Error;
    pub use surge_core::{
        IterationContext, IterationResult, MetricsSnapshot, RunReport, Stage, TargetError,
        TargetResponse, Verdict,
    };
}
