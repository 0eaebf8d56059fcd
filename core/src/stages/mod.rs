// squadpipe/src/stages/mod.rs

//! Ready-made workers for common stage roles.

pub mod collector;
pub mod dedup;
pub mod printer;
pub mod timer;

pub use collector::Collector;
pub use dedup::{Dedup, SeedSource};
pub use printer::Printer;
pub use timer::Timer;
