//! Sampling pipeline and the collective plumbing it runs on.

pub mod assembler;
pub mod communicator;
pub mod dedup;
pub mod exchange;
pub mod frontier;
pub mod rng;
pub mod sampling;
pub mod wire;

pub use sampling::{SampleRequest, uniform_neighbor_sample};
