//! Vertex identity and ownership.
//!
//! - [`vertex`]: id-width traits for vertices, edge ids and weights
//! - [`ownership`]: which rank owns (and samples) each vertex

pub mod ownership;
pub mod vertex;

pub use ownership::VertexOwnership;
pub use vertex::{EdgeId, EdgeType, EdgeWeight, Label, VertexId, WireId};
