pub mod control;
pub mod envelope;
pub mod link;
pub mod retry;
pub mod worker;

// Re-export key types for easier access from other modules (and lib.rs)
pub use control::{fatal, ErrorClass, Fatal, Outcome};
pub use envelope::{Envelope, Failure};
pub use link::{Link, LinkControl, Queued};
pub use retry::RetryPolicy;
pub use worker::{Worker, WorkerContext};
