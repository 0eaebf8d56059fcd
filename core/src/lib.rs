// src/lib.rs

//! squadpipe: a concurrent, multi-stage pipeline runtime for Rust.
//!
//! A pipeline is a chain of *squads* (groups of interchangeable workers)
//! connected by *links* (a queue plus a completion signal):
//!  - Every worker runs its own drain loop as an independent task, pulling
//!    from the squad's shared input link and pushing to its shared output link.
//!  - Workers answer each item with an `Outcome`: emit, suppress, retry, or fail.
//!  - Expected errors travel downstream as failure envelopes; unclassified
//!    errors are fatal and kill the whole pipeline.
//!  - A link completes only after every worker of the upstream squad finished.
//!  - `shutdown` drains gracefully, `kill` also discards queued items.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod stages;

// --- Re-exports for the Public API ---

// Worker contract and the data flowing between squads
pub use crate::core::control::{default_classify, fatal, ErrorClass, Fatal, Outcome};
pub use crate::core::envelope::{Envelope, Failure};
pub use crate::core::link::{Link, LinkControl, Queued};
pub use crate::core::retry::RetryPolicy;
pub use crate::core::worker::{Worker, WorkerContext};

// Building and running pipelines
pub use crate::pipeline::drain::RETRIES_EXHAUSTED;
pub use crate::pipeline::{
  DrainStats, Pipeline, PipelineBuilder, PipelineConfig, PipelineHandle, PipelineState, RunSummary, Squad,
};

pub use crate::error::{PipeError, PipeResult};

/*
    Core Workflow:
    1. Implement `Worker` for each stage: set `Input`/`Output`, write `work`,
       and override `prepare`, `handle_failed_input`, `finish`,
       `first_pipe_prepare` or `classify` where the stage needs it.
    2. Group workers into squads: `Squad::single(w)` or `Squad::from_fn(n, |i| ...)`.
    3. Chain squads: `Pipeline::builder(config).squad(head).then(next)...build()?`.
       Adjacent squads must agree on payload type.
    4. Keep a `pipeline.handle()` to wire external interrupts to
       `shutdown()` / `kill()`.
    5. `pipeline.run().await` blocks until every worker has stopped.
*/
