//! Optional per-edge property views selected at call time.
//!
//! Each view is indexed by *local edge position* on this rank, i.e. the
//! positions [`LocalSample::edge_positions`](crate::graph::LocalSample) refers
//! to. Absent views flow through the pipeline as `None` and produce `None`
//! output columns.

use crate::sampler_error::SamplerError;
use crate::topology::vertex::{EdgeId, EdgeType, EdgeWeight};

/// Borrowed weight / id / type columns for the local edges of one rank.
#[derive(Copy, Clone, Debug)]
pub struct EdgeProperties<'a, E, W> {
    pub weights: Option<&'a [W]>,
    pub edge_ids: Option<&'a [E]>,
    pub edge_types: Option<&'a [EdgeType]>,
}

impl<E, W> Default for EdgeProperties<'_, E, W> {
    fn default() -> Self {
        Self {
            weights: None,
            edge_ids: None,
            edge_types: None,
        }
    }
}

impl<'a, E: EdgeId, W: EdgeWeight> EdgeProperties<'a, E, W> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, w: &'a [W]) -> Self {
        self.weights = Some(w);
        self
    }

    pub fn with_edge_ids(mut self, ids: &'a [E]) -> Self {
        self.edge_ids = Some(ids);
        self
    }

    pub fn with_edge_types(mut self, types: &'a [EdgeType]) -> Self {
        self.edge_types = Some(types);
        self
    }

    /// Every present view must cover all `local_edges` positions.
    pub fn check_len(&self, local_edges: usize) -> Result<(), SamplerError> {
        let lens = [
            ("weight", self.weights.map(<[W]>::len)),
            ("edge id", self.edge_ids.map(<[E]>::len)),
            ("edge type", self.edge_types.map(<[EdgeType]>::len)),
        ];
        for (name, len) in lens {
            if let Some(len) = len {
                if len != local_edges {
                    return Err(SamplerError::invalid(format!(
                        "{name} view has {len} entries, partition has {local_edges} local edges"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Wire-encoded tags of local edge `pos`; absent views read as zero.
    #[inline]
    pub(crate) fn wire_tags(&self, pos: usize) -> (u64, f64, EdgeType) {
        (
            self.edge_ids.map_or(0, |ids| ids[pos].to_wire()),
            self.weights.map_or(0.0, |w| w[pos].to_wire()),
            self.edge_types.map_or(0, |t| t[pos]),
        )
    }

    /// Which optional columns the output carries.
    pub fn presence(&self) -> PropertyPresence {
        PropertyPresence {
            weights: self.weights.is_some(),
            edge_ids: self.edge_ids.is_some(),
            edge_types: self.edge_types.is_some(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyPresence {
    pub weights: bool,
    pub edge_ids: bool,
    pub edge_types: bool,
}
