//! SamplerError: unified error type for frontier-sampler public APIs
//!
//! Every failure of a sampling call is call-level and terminal. Errors that a
//! rank detects locally are also turned into an abort status that travels on
//! the wire, so each variant maps onto a stable [`ErrorCode`].

use thiserror::Error;

/// Unified error type for sampling operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// Inconsistent or malformed call arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A starting vertex lies outside the graph's id range.
    #[error("starting vertex {vertex} is outside the valid vertex range (rank {rank})")]
    OutOfRangeVertex { vertex: u64, rank: usize },
    /// The graph store was asked to sample a vertex it does not hold.
    #[error("vertex {vertex} is not a valid local vertex on rank {rank}")]
    InvalidVertex { vertex: u64, rank: usize },
    /// A host allocation could not be satisfied.
    #[error("resource exhausted while allocating {requested} {what}")]
    ResourceExhausted { what: &'static str, requested: usize },
    /// Ranks diverged in the sequence of collective calls.
    #[error(
        "collective protocol error with rank {peer}: expected exchange #{expected_seq} ({expected_kind}), got #{got_seq} ({got_kind})"
    )]
    CollectiveProtocolError {
        peer: usize,
        expected_seq: u32,
        expected_kind: u16,
        got_seq: u32,
        got_kind: u16,
    },
    /// Transport-level failure talking to a neighbor.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommFailure,
    },
    /// Another rank failed and broadcast an abort.
    #[error("rank {rank} aborted the sampling call ({code:?})")]
    PeerAborted { rank: usize, code: ErrorCode },
}

/// Boxed-free transport failure description (keeps `SamplerError: Clone + Eq`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommFailure(pub String);

impl From<String> for CommFailure {
    fn from(s: String) -> Self {
        CommFailure(s)
    }
}

impl From<&str> for CommFailure {
    fn from(s: &str) -> Self {
        CommFailure(s.to_owned())
    }
}

/// Stable wire code for each error kind; `Ok` marks a healthy rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    Ok = 0,
    InvalidArgument = 1,
    OutOfRangeVertex = 2,
    InvalidVertex = 3,
    ResourceExhausted = 4,
    CollectiveProtocol = 5,
    Comm = 6,
    Unknown = 0xFFFF,
}

impl ErrorCode {
    pub fn from_wire(raw: u16) -> Self {
        match raw {
            0 => ErrorCode::Ok,
            1 => ErrorCode::InvalidArgument,
            2 => ErrorCode::OutOfRangeVertex,
            3 => ErrorCode::InvalidVertex,
            4 => ErrorCode::ResourceExhausted,
            5 => ErrorCode::CollectiveProtocol,
            6 => ErrorCode::Comm,
            _ => ErrorCode::Unknown,
        }
    }

    #[inline]
    pub fn to_wire(self) -> u16 {
        self as u16
    }
}

impl SamplerError {
    /// Abort code broadcast to peers when this error stops the local rank.
    pub fn code(&self) -> ErrorCode {
        match self {
            SamplerError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            SamplerError::OutOfRangeVertex { .. } => ErrorCode::OutOfRangeVertex,
            SamplerError::InvalidVertex { .. } => ErrorCode::InvalidVertex,
            SamplerError::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            SamplerError::CollectiveProtocolError { .. } => ErrorCode::CollectiveProtocol,
            SamplerError::CommError { .. } => ErrorCode::Comm,
            // re-broadcasting a peer's abort keeps the original kind
            SamplerError::PeerAborted { code, .. } => *code,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SamplerError::InvalidArgument(msg.into())
    }
}

/// Reserve `additional` slots in `v`, mapping allocation failure to
/// [`SamplerError::ResourceExhausted`].
pub(crate) fn try_reserve<T>(
    v: &mut Vec<T>,
    additional: usize,
    what: &'static str,
) -> Result<(), SamplerError> {
    v.try_reserve(additional)
        .map_err(|_| SamplerError::ResourceExhausted {
            what,
            requested: additional,
        })
}
