//! Id-width traits for vertices, edge ids and edge weights.
//!
//! A graph instance picks a narrow (32-bit) or wide (64-bit) integer for its
//! vertex ids and, independently, for its edge ids. Everything downstream is
//! generic over these traits so the sampler is written once and instantiated
//! per width combination. On the wire every id travels as a `u64`.

use num_traits::PrimInt;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Integer identifier that can be carried on the wire as a `u64`.
pub trait WireId: PrimInt + Hash + Debug + Display + Default + Send + Sync + 'static {
    /// Widen to the wire representation (two's complement for signed ids).
    fn to_wire(self) -> u64;
    /// Narrow back from the wire representation.
    fn from_wire(w: u64) -> Self;
    /// Dense non-negative index, `None` for negative ids.
    fn index(self) -> Option<u64>;
}

/// Vertex identifier.
pub trait VertexId: WireId {}

/// Edge identifier (width independent of [`VertexId`]).
pub trait EdgeId: WireId {}

macro_rules! impl_wire_id_unsigned {
    ($($t:ty),*) => {$(
        impl WireId for $t {
            #[inline]
            fn to_wire(self) -> u64 { self as u64 }
            #[inline]
            fn from_wire(w: u64) -> Self { w as $t }
            #[inline]
            fn index(self) -> Option<u64> { Some(self as u64) }
        }
        impl VertexId for $t {}
        impl EdgeId for $t {}
    )*};
}

macro_rules! impl_wire_id_signed {
    ($($t:ty),*) => {$(
        impl WireId for $t {
            #[inline]
            fn to_wire(self) -> u64 { self as i64 as u64 }
            #[inline]
            fn from_wire(w: u64) -> Self { w as i64 as $t }
            #[inline]
            fn index(self) -> Option<u64> {
                if self < 0 { None } else { Some(self as u64) }
            }
        }
        impl VertexId for $t {}
        impl EdgeId for $t {}
    )*};
}

impl_wire_id_unsigned!(u32, u64);
impl_wire_id_signed!(i32, i64);

/// Floating-point edge weight.
pub trait EdgeWeight: Copy + PartialEq + Debug + Default + Send + Sync + 'static {
    fn to_wire(self) -> f64;
    fn from_wire(w: f64) -> Self;
}

impl EdgeWeight for f32 {
    #[inline]
    fn to_wire(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_wire(w: f64) -> Self {
        w as f32
    }
}

impl EdgeWeight for f64 {
    #[inline]
    fn to_wire(self) -> f64 {
        self
    }
    #[inline]
    fn from_wire(w: f64) -> Self {
        w
    }
}

/// Label grouping seeds of one independent sampling request.
pub type Label = i32;

/// Edge type tag.
pub type EdgeType = i32;
