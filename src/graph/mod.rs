//! Partitioned graph store: the collaborator that owns edges and samples them.
//!
//! The sampler only needs three things from a graph partition: the global
//! ownership rule, this rank's id, and a local sampling primitive over the
//! vertices this rank owns. [`InMemoryPartition`] is the built-in store.

pub mod csr;
pub mod properties;

pub use csr::InMemoryPartition;
pub use properties::{EdgeProperties, PropertyPresence};

use crate::algs::rng::RngSubstream;
use crate::sampler_error::SamplerError;
use crate::topology::ownership::VertexOwnership;
use crate::topology::vertex::VertexId;

/// Result of one local sampling request.
///
/// Row `j` is the edge `sources[source_index[j]] -> destinations[j]`, stored
/// at local edge position `edge_positions[j]`. Rows of one source are
/// contiguous and sources appear in request order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalSample<V> {
    pub source_index: Vec<usize>,
    pub destinations: Vec<V>,
    pub edge_positions: Vec<usize>,
    /// Draws consumed from the substream.
    pub draws: u64,
}

impl<V> LocalSample<V> {
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// One rank's share of a graph partitioned by source-vertex ownership.
pub trait PartitionedGraph<V: VertexId>: Sync {
    /// Rank this partition belongs to.
    fn rank(&self) -> usize;

    /// Global ownership rule shared by every partition of the graph.
    fn ownership(&self) -> &VertexOwnership;

    /// Number of edges stored on this rank (length of property views).
    fn local_edge_count(&self) -> usize;

    /// Sample up to `fanout` out-edges of each of `sources` (all of them for
    /// `fanout == -1`), drawing randomness from `rng` only.
    ///
    /// With `do_expensive_check`, a source not owned by this rank fails with
    /// [`SamplerError::InvalidVertex`]; otherwise it samples as isolated.
    fn local_sample(
        &self,
        sources: &[V],
        fanout: i32,
        with_replacement: bool,
        rng: &RngSubstream,
        do_expensive_check: bool,
    ) -> Result<LocalSample<V>, SamplerError>;
}
