//! Frontier manager: the active (label, vertex) pairs of the current hop.
//!
//! A frontier only ever holds vertices owned by this rank: seeds are routed
//! to their owner before hop 0, and the destinations that make up the next
//! frontier arrive with the edge records routed by destination owner.

use crate::algs::wire::{WireEdge, WireFrontier};
use crate::sampler_error::{SamplerError, try_reserve};
use crate::topology::vertex::{Label, VertexId};

/// One (vertex, label) pair; ordered by label first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrontierEntry<V> {
    pub label: Label,
    pub vertex: V,
}

impl<V: VertexId> FrontierEntry<V> {
    pub fn new(vertex: V, label: Label) -> Self {
        Self { label, vertex }
    }

    pub fn to_wire(self) -> WireFrontier {
        WireFrontier::new(self.vertex.to_wire(), self.label)
    }

    pub fn from_wire(w: &WireFrontier) -> Self {
        Self::new(V::from_wire(w.vertex()), w.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frontier<V> {
    hop: usize,
    entries: Vec<FrontierEntry<V>>,
}

impl<V: VertexId> Frontier<V> {
    /// Seed entries from the caller's starting vertices; label 0 if unlabeled.
    pub fn seeds(vertices: &[V], labels: Option<&[Label]>) -> Result<Vec<FrontierEntry<V>>, SamplerError> {
        match labels {
            Some(ls) if ls.len() != vertices.len() => Err(SamplerError::invalid(format!(
                "{} starting labels for {} starting vertices",
                ls.len(),
                vertices.len()
            ))),
            Some(ls) => Ok(vertices
                .iter()
                .zip(ls)
                .map(|(&v, &l)| FrontierEntry::new(v, l))
                .collect()),
            None => Ok(vertices.iter().map(|&v| FrontierEntry::new(v, 0)).collect()),
        }
    }

    /// Hop-0 frontier from seeds already routed to this rank.
    pub fn initial(received: &[WireFrontier]) -> Self {
        Self {
            hop: 0,
            entries: received.iter().map(FrontierEntry::from_wire).collect(),
        }
    }

    /// Next hop's frontier: the destinations of the edges this rank received.
    pub fn advance(self, received: &[WireEdge]) -> Result<Self, SamplerError> {
        let mut entries = self.entries;
        entries.clear();
        try_reserve(&mut entries, received.len(), "next frontier")?;
        entries.extend(
            received
                .iter()
                .map(|e| FrontierEntry::new(V::from_wire(e.dst()), e.label())),
        );
        Ok(Self {
            hop: self.hop + 1,
            entries,
        })
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FrontierEntry<V>] {
        &self.entries
    }

    /// Hand the candidates to the dedup stage, leaving the frontier empty.
    pub fn take_entries(&mut self) -> Vec<FrontierEntry<V>> {
        std::mem::take(&mut self.entries)
    }
}
