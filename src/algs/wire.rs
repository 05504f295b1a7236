//! Fixed, versioned, little-endian wire types for the sampling exchanges.

use crate::topology::vertex::{EdgeType, Label};
use bytemuck::{Pod, Zeroable};
use static_assertions::{const_assert, const_assert_eq};
use std::mem::{align_of, size_of};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a received byte buffer into `out`, which must hold exactly the
/// records the buffer carries.
///
/// Copies through `pod_read_unaligned`, so the buffer needs no alignment.
pub fn decode_into<T: Pod>(bytes: &[u8], out: &mut [T]) -> Result<(), String> {
    let sz = size_of::<T>();
    if sz == 0 || bytes.len() != out.len() * sz {
        return Err(format!(
            "payload of {} bytes does not hold {} records of {sz} bytes",
            bytes.len(),
            out.len()
        ));
    }
    for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(sz)) {
        *dst = bytemuck::pod_read_unaligned(chunk);
    }
    Ok(())
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Exchange kinds; every collective round names what it carries.
pub mod kind {
    pub const SEEDS: u16 = 1;
    pub const HOP_EDGES: u16 = 2;
    pub const LABELS: u16 = 3;
    pub const REBALANCE: u16 = 4;
    pub const COMMIT: u16 = 5;
}

// ===== Round header ========================================================

/// First message of every round, sent to every peer.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    /// `ErrorCode` of the sender; non-zero means the sender aborts.
    pub status_le: u16,
    pub reserved_le: u16,
    pub seq_le: u32,
    /// Number of payload records that follow in the data round.
    pub count_le: u32,
    /// Piggy-backed scalar (draw counts at commit).
    pub value_le: u64,
}

impl WireHdr {
    pub fn new(kind: u16, seq: u32, status: u16, count: usize, value: u64) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            status_le: status.to_le(),
            reserved_le: 0,
            seq_le: seq.to_le(),
            count_le: (count as u32).to_le(),
            value_le: value.to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn status(&self) -> u16 {
        u16::from_le(self.status_le)
    }
    pub fn seq(&self) -> u32 {
        u32::from_le(self.seq_le)
    }
    pub fn count(&self) -> usize {
        u32::from_le(self.count_le) as usize
    }
    pub fn value(&self) -> u64 {
        u64::from_le(self.value_le)
    }
}

// ===== Payload records =====================================================

/// A (vertex, label) frontier entry.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireFrontier {
    pub vertex_le: u64,
    pub label_le: u32,
    pub _pad: u32,
}

impl WireFrontier {
    pub fn new(vertex: u64, label: Label) -> Self {
        Self {
            vertex_le: vertex.to_le(),
            label_le: (label as u32).to_le(),
            _pad: 0,
        }
    }
    pub fn vertex(&self) -> u64 {
        u64::from_le(self.vertex_le)
    }
    pub fn label(&self) -> Label {
        u32::from_le(self.label_le) as Label
    }
}

/// One sampled edge with every optional tag; absent tags travel as zero.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq)]
pub struct WireEdge {
    pub src_le: u64,
    pub dst_le: u64,
    pub edge_id_le: u64,
    pub weight_bits_le: u64,
    pub edge_type_le: u32,
    pub label_le: u32,
    pub hop_le: u32,
    pub _pad: u32,
}

impl WireEdge {
    pub const SIZE: usize = 48; // 4*8 + 4*4

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src: u64,
        dst: u64,
        edge_id: u64,
        weight: f64,
        edge_type: EdgeType,
        label: Label,
        hop: i32,
    ) -> Self {
        Self {
            src_le: src.to_le(),
            dst_le: dst.to_le(),
            edge_id_le: edge_id.to_le(),
            weight_bits_le: weight.to_bits().to_le(),
            edge_type_le: (edge_type as u32).to_le(),
            label_le: (label as u32).to_le(),
            hop_le: (hop as u32).to_le(),
            _pad: 0,
        }
    }
    pub fn src(&self) -> u64 {
        u64::from_le(self.src_le)
    }
    pub fn dst(&self) -> u64 {
        u64::from_le(self.dst_le)
    }
    pub fn edge_id(&self) -> u64 {
        u64::from_le(self.edge_id_le)
    }
    pub fn weight(&self) -> f64 {
        f64::from_bits(u64::from_le(self.weight_bits_le))
    }
    pub fn edge_type(&self) -> EdgeType {
        u32::from_le(self.edge_type_le) as EdgeType
    }
    pub fn label(&self) -> Label {
        u32::from_le(self.label_le) as Label
    }
    pub fn hop(&self) -> i32 {
        u32::from_le(self.hop_le) as i32
    }
}

/// A bare label, used to agree on the global label order.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireLabel {
    pub label_le: u32,
}

impl WireLabel {
    pub fn new(label: Label) -> Self {
        Self {
            label_le: (label as u32).to_le(),
        }
    }
    pub fn get(&self) -> Label {
        u32::from_le(self.label_le) as Label
    }
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireHdr>(), 24);
const_assert_eq!(size_of::<WireFrontier>(), 16);
const_assert_eq!(size_of::<WireEdge>(), WireEdge::SIZE);
const_assert_eq!(size_of::<WireLabel>(), 4);
const_assert!(align_of::<WireEdge>() == 8);
