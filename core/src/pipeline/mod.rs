// squadpipe/src/pipeline/mod.rs

pub mod config;
pub mod definition;
pub mod drain;
pub mod execution;
pub mod squad;
pub(crate) mod stage;
pub mod state;

pub use config::PipelineConfig;
pub use definition::{Pipeline, PipelineBuilder};
pub use drain::DrainStats;
pub use execution::{PipelineHandle, RunSummary};
pub use squad::Squad;
pub use state::PipelineState;
