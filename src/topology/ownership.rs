//! Ownership rule for graph vertices.
//!
//! The [`VertexOwnership`] rule assigns every vertex id in `[0, num_vertices)`
//! to exactly one rank. Edges are stored with the owner of their source
//! vertex, so the owner is also the only rank that can sample a vertex.

use crate::sampler_error::SamplerError;
use crate::topology::vertex::VertexId;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VertexOwnership {
    /// Rank `r` owns `[range_lasts[r - 1], range_lasts[r])` (`0` for `r == 0`).
    Contiguous { range_lasts: Vec<u64> },
    /// Rank is a fixed mix of the id modulo the number of ranks.
    Hashed { num_vertices: u64, num_ranks: usize },
}

impl VertexOwnership {
    /// Split `[0, num_vertices)` into `num_ranks` near-equal contiguous ranges.
    pub fn contiguous_even(num_vertices: u64, num_ranks: usize) -> Self {
        let n = num_ranks.max(1) as u64;
        let base = num_vertices / n;
        let extra = num_vertices % n;
        let mut last = 0u64;
        let range_lasts = (0..n)
            .map(|r| {
                last += base + u64::from(r < extra);
                last
            })
            .collect();
        VertexOwnership::Contiguous { range_lasts }
    }

    /// Build from explicit per-rank range ends; must be non-decreasing.
    pub fn from_range_lasts(range_lasts: Vec<u64>) -> Result<Self, SamplerError> {
        if range_lasts.is_empty() {
            return Err(SamplerError::invalid("ownership needs at least one rank"));
        }
        if range_lasts.windows(2).any(|w| w[0] > w[1]) {
            return Err(SamplerError::invalid(
                "vertex range ends must be non-decreasing",
            ));
        }
        Ok(VertexOwnership::Contiguous { range_lasts })
    }

    pub fn hashed(num_vertices: u64, num_ranks: usize) -> Self {
        VertexOwnership::Hashed {
            num_vertices,
            num_ranks: num_ranks.max(1),
        }
    }

    /// Number of ranks the rule distributes over.
    pub fn num_ranks(&self) -> usize {
        match self {
            VertexOwnership::Contiguous { range_lasts } => range_lasts.len(),
            VertexOwnership::Hashed { num_ranks, .. } => *num_ranks,
        }
    }

    /// Global vertex count.
    pub fn num_vertices(&self) -> u64 {
        match self {
            VertexOwnership::Contiguous { range_lasts } => {
                range_lasts.last().copied().unwrap_or(0)
            }
            VertexOwnership::Hashed { num_vertices, .. } => *num_vertices,
        }
    }

    /// True if `v` is a valid id of this graph instance.
    pub fn contains<V: VertexId>(&self, v: V) -> bool {
        v.index().is_some_and(|i| i < self.num_vertices())
    }

    /// Owning rank of `v`.
    ///
    /// Total over all ids: ids outside the valid range are clamped onto some
    /// rank, which then simply finds no local edges for them. Use
    /// [`owner_checked`](Self::owner_checked) to reject them instead.
    pub fn owner<V: VertexId>(&self, v: V) -> usize {
        let idx = v.index().unwrap_or(0);
        match self {
            VertexOwnership::Contiguous { range_lasts } => {
                let r = range_lasts.partition_point(|&last| last <= idx);
                r.min(range_lasts.len().saturating_sub(1))
            }
            VertexOwnership::Hashed { num_ranks, .. } => {
                (mix64(idx) % *num_ranks as u64) as usize
            }
        }
    }

    /// Owning rank of `v`, or `OutOfRangeVertex` if `v` is not a valid id.
    pub fn owner_checked<V: VertexId>(&self, v: V, my_rank: usize) -> Result<usize, SamplerError> {
        if self.contains(v) {
            Ok(self.owner(v))
        } else {
            Err(SamplerError::OutOfRangeVertex {
                vertex: v.to_wire(),
                rank: my_rank,
            })
        }
    }

    /// Returns true if `v` is owned by `rank`.
    pub fn is_owned_by<V: VertexId>(&self, v: V, rank: usize) -> bool {
        self.contains(v) && self.owner(v) == rank
    }
}

/// SplitMix64 finalizer; fixed so every process computes the same owner.
#[inline]
pub(crate) fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
