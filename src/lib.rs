#![cfg_attr(docsrs, feature(doc_cfg))]
//! # frontier-sampler
//!
//! frontier-sampler draws multi-hop uniform neighbor samples from a graph
//! whose edges are partitioned across a group of ranks, the way GNN
//! mini-batch loaders need them. Every rank calls
//! [`uniform_neighbor_sample`](algs::sampling::uniform_neighbor_sample)
//! collectively and gets back its share of the sampled edges.
//!
//! ## Features
//! - Per-hop fan-out with or without replacement, `-1` for every edge
//! - Optional weight / edge id / edge type columns carried through sampling
//! - Labeled seeds with per-label output segments and label-to-rank rebalance
//! - Prior-source policies (default, carry-over, exclude) and source dedup
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - Abort-aware collective rounds: a local failure fails every rank instead
//!   of leaving peers blocked
//!
//! ## Determinism
//!
//! Randomness comes from a caller-owned [`RngState`](algs::rng::RngState):
//! a ChaCha8 keystream per `(rank, hop)` with per-vertex draw offsets. The
//! same seed, counter, graph partitioning and inputs give the same sample,
//! independent of thread scheduling. A successful call advances the counter
//! by the group-wide number of draws so repeated calls never reuse values.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! frontier-sampler = "0.1"
//! # Optional features:
//! # features = ["mpi-support","rayon"]
//! ```

pub mod algs;
pub mod config;
pub mod debug_invariants;
pub mod graph;
pub mod sampler_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::assembler::{LabelOffsets, LabelToRankMap, SampleOutput};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    pub use crate::algs::rng::RngState;
    pub use crate::algs::sampling::{SampleRequest, uniform_neighbor_sample};
    pub use crate::config::{PriorSourcesBehavior, SamplingConfig};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::graph::{EdgeProperties, InMemoryPartition, PartitionedGraph};
    pub use crate::sampler_error::{ErrorCode, SamplerError};
    pub use crate::topology::ownership::VertexOwnership;
    pub use crate::topology::vertex::{EdgeId, EdgeType, EdgeWeight, Label, VertexId};
}
