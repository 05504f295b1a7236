//! Frozen CSR partition of a directed graph.
//!
//! Immutable, cache-friendly adjacency for the edges whose source this rank
//! owns. Neighbor lists are sorted by destination, so local edge positions
//! are deterministic for a given global edge list and ownership rule. Each
//! local edge remembers its position in the global edge list, which is how
//! per-edge property arrays are sliced per rank.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::algs::rng::{RngSubstream, draws_for};
use crate::debug_invariants::DebugInvariants;
use crate::graph::{LocalSample, PartitionedGraph};
use crate::sampler_error::{SamplerError, try_reserve};
use crate::topology::ownership::VertexOwnership;
use crate::topology::vertex::VertexId;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[derive(Clone, Debug)]
pub struct InMemoryPartition<V: VertexId> {
    rank: usize,
    ownership: VertexOwnership,
    /// Local source vertex → dense row.
    row_of: HashMap<V, u32>,
    /// Dense row → local source vertex, ascending.
    vertex_of: Vec<V>,
    offsets: Vec<usize>,
    dsts: Vec<V>,
    /// Local edge position → index in the global edge list.
    global_edge: Vec<usize>,
}

impl<V: VertexId> InMemoryPartition<V> {
    /// Build rank `rank`'s partition from the global edge list.
    pub fn from_edges(
        rank: usize,
        edges: &[(V, V)],
        ownership: &VertexOwnership,
    ) -> Result<Self, SamplerError> {
        if rank >= ownership.num_ranks() {
            return Err(SamplerError::invalid(format!(
                "rank {rank} outside ownership of {} ranks",
                ownership.num_ranks()
            )));
        }
        for &(s, d) in edges {
            for v in [s, d] {
                if !ownership.contains(v) {
                    return Err(SamplerError::OutOfRangeVertex {
                        vertex: v.to_wire(),
                        rank,
                    });
                }
            }
        }

        // 1) local edges in (src, dst, global index) order
        let local: Vec<(usize, V, V)> = edges
            .iter()
            .enumerate()
            .filter(|(_, (s, _))| ownership.owner(*s) == rank)
            .map(|(g, &(s, d))| (g, s, d))
            .sorted_by_key(|&(g, s, d)| (s, d, g))
            .collect();

        // 2) rows and offsets
        let mut vertex_of = Vec::new();
        let mut offsets = vec![0usize];
        for (src, group) in &local.iter().chunk_by(|(_, s, _)| *s) {
            vertex_of.push(src);
            offsets.push(offsets[offsets.len() - 1] + group.count());
        }
        let row_of = vertex_of
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i as u32))
            .collect();

        let part = Self {
            rank,
            ownership: ownership.clone(),
            row_of,
            vertex_of,
            offsets,
            dsts: local.iter().map(|&(_, _, d)| d).collect(),
            global_edge: local.iter().map(|&(g, _, _)| g).collect(),
        };
        part.debug_assert_invariants();
        Ok(part)
    }

    /// Every rank's partition at once (handy for in-process groups and tests).
    pub fn build_all(edges: &[(V, V)], ownership: &VertexOwnership) -> Result<Vec<Self>, SamplerError> {
        (0..ownership.num_ranks())
            .map(|r| Self::from_edges(r, edges, ownership))
            .collect()
    }

    /// Slice a per-edge array indexed by global edge position down to this
    /// rank's local edge order.
    pub fn gather_edge_property<T: Copy>(&self, global: &[T]) -> Result<Vec<T>, SamplerError> {
        self.global_edge
            .iter()
            .map(|&g| {
                global.get(g).copied().ok_or_else(|| {
                    SamplerError::invalid(format!(
                        "property array of {} entries has no entry for edge {g}",
                        global.len()
                    ))
                })
            })
            .collect()
    }

    /// Out-neighbors of a local vertex (empty if not stored here).
    pub fn neighbors(&self, v: V) -> &[V] {
        match self.row_range(v) {
            Some((a, b)) => &self.dsts[a..b],
            None => &[],
        }
    }

    pub fn degree(&self, v: V) -> usize {
        self.row_range(v).map_or(0, |(a, b)| b - a)
    }

    fn row_range(&self, v: V) -> Option<(usize, usize)> {
        self.row_of.get(&v).map(|&r| {
            let r = r as usize;
            (self.offsets[r], self.offsets[r + 1])
        })
    }

    /// Local edge positions picked for one source.
    fn sample_row(
        &self,
        v: V,
        fanout: i32,
        with_replacement: bool,
        rng: &RngSubstream,
        draw_offset: u64,
    ) -> Result<Vec<usize>, SamplerError> {
        let Some((start, end)) = self.row_range(v) else {
            return Ok(Vec::new());
        };
        let degree = end - start;
        let mut row = Vec::new();
        try_reserve(&mut row, rows_for(degree, fanout, with_replacement), "sampled row")?;
        if draws_for(degree, fanout, with_replacement) == 0 {
            // take-all, or nothing to choose between
            if fanout != 0 {
                row.extend(start..end);
            }
            return Ok(row);
        }
        let k = fanout as usize;
        let mut draws = rng.draws_at(draw_offset);
        if with_replacement {
            row.extend((0..k).map(|_| start + draws.index(degree)));
            return Ok(row);
        }
        // Floyd's algorithm: exactly k draws for k distinct picks.
        let mut picked: HashSet<usize> = HashSet::new();
        picked
            .try_reserve(k)
            .map_err(|_| SamplerError::ResourceExhausted {
                what: "without-replacement picks",
                requested: k,
            })?;
        for j in (degree - k)..degree {
            let t = draws.index(j + 1);
            if !picked.insert(t) {
                picked.insert(j);
            }
        }
        row.extend(picked.into_iter().map(|i| start + i));
        row.sort_unstable();
        Ok(row)
    }
}

/// Rows a vertex with `degree` out-edges contributes to one hop.
fn rows_for(degree: usize, fanout: i32, with_replacement: bool) -> usize {
    match usize::try_from(fanout) {
        _ if degree == 0 => 0,
        Err(_) => degree,
        Ok(k) if with_replacement => k,
        Ok(k) => k.min(degree),
    }
}

impl<V: VertexId> PartitionedGraph<V> for InMemoryPartition<V> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn ownership(&self) -> &VertexOwnership {
        &self.ownership
    }

    fn local_edge_count(&self) -> usize {
        self.dsts.len()
    }

    fn local_sample(
        &self,
        sources: &[V],
        fanout: i32,
        with_replacement: bool,
        rng: &RngSubstream,
        do_expensive_check: bool,
    ) -> Result<LocalSample<V>, SamplerError> {
        if do_expensive_check {
            if let Some(&bad) = sources
                .iter()
                .find(|&&v| !self.ownership.is_owned_by(v, self.rank))
            {
                return Err(SamplerError::InvalidVertex {
                    vertex: bad.to_wire(),
                    rank: self.rank,
                });
            }
        }

        // per-source draw offsets, so sources can be sampled in any order
        let mut offsets = Vec::new();
        try_reserve(&mut offsets, sources.len(), "draw offsets")?;
        let mut total = 0u64;
        let mut n = 0usize;
        for &v in sources {
            let degree = self.degree(v);
            offsets.push(total);
            total = total.saturating_add(draws_for(degree, fanout, with_replacement));
            n = n.saturating_add(rows_for(degree, fanout, with_replacement));
        }
        // a hop's rows are exchanged under u32 record counts
        if n > u32::MAX as usize {
            return Err(SamplerError::ResourceExhausted {
                what: "sampled edges in one hop",
                requested: n,
            });
        }

        let sample_one =
            |(i, &v): (usize, &V)| self.sample_row(v, fanout, with_replacement, rng, offsets[i]);
        #[cfg(feature = "rayon")]
        let rows: Vec<Vec<usize>> = sources
            .par_iter()
            .enumerate()
            .map(sample_one)
            .collect::<Result<_, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let rows: Vec<Vec<usize>> = sources
            .iter()
            .enumerate()
            .map(sample_one)
            .collect::<Result<_, _>>()?;

        let mut out = LocalSample {
            source_index: Vec::new(),
            destinations: Vec::new(),
            edge_positions: Vec::new(),
            draws: total,
        };
        try_reserve(&mut out.source_index, n, "sampled edges in one hop")?;
        try_reserve(&mut out.destinations, n, "sampled edges in one hop")?;
        try_reserve(&mut out.edge_positions, n, "sampled edges in one hop")?;
        for (i, row) in rows.into_iter().enumerate() {
            for pos in row {
                out.source_index.push(i);
                out.destinations.push(self.dsts[pos]);
                out.edge_positions.push(pos);
            }
        }
        Ok(out)
    }
}

impl<V: VertexId> DebugInvariants for InMemoryPartition<V> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "InMemoryPartition");
    }

    fn validate_invariants(&self) -> Result<(), SamplerError> {
        if self.offsets.len() != self.vertex_of.len() + 1 {
            return Err(SamplerError::invalid("CSR offsets / rows length mismatch"));
        }
        if self.offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(SamplerError::invalid("CSR offsets are not monotone"));
        }
        if self.offsets.last().copied() != Some(self.dsts.len())
            || self.global_edge.len() != self.dsts.len()
        {
            return Err(SamplerError::invalid("CSR edge arrays length mismatch"));
        }
        if let Some(&v) = self
            .vertex_of
            .iter()
            .find(|&&v| !self.ownership.is_owned_by(v, self.rank))
        {
            return Err(SamplerError::InvalidVertex {
                vertex: v.to_wire(),
                rank: self.rank,
            });
        }
        Ok(())
    }
}
