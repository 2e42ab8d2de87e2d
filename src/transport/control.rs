//! Control operations understood by channels

use std::io;

use crate::metadata::TopicMetadata;

/// Descriptor passed to the registration endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    /// Channel path to create
    pub path: String,
    /// Element size in bytes
    pub esize: usize,
    /// Requested buffer depth; 0 selects the transport default
    pub nbuffer: u32,
}

/// Channel state as reported by the transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawState {
    /// Minimum publish interval in microseconds, 0 if unset
    pub min_interval: u32,
    /// Maximum batching delay in microseconds, 0 if unset
    pub min_latency: u32,
    /// Buffer depth in element slots
    pub nbuffer: u32,
    /// Active subscribers
    pub nsubscribers: u32,
    /// Active advertisers
    pub nadvertisers: u32,
    /// Number of samples published so far
    pub generation: u64,
}

/// Closed set of control operations, plus a raw passthrough
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOp {
    /// Create a channel (registration endpoint only)
    Register(RegisterInfo),
    /// Attach topic identity so tooling can see name and size
    AttachIdentity(TopicMetadata),
    /// Request a buffer depth in element slots
    SetBufferDepth(u32),
    /// Fetch [`RawState`]
    GetRawState,
    /// Set the minimum publish interval in microseconds
    SetMinInterval(u32),
    /// Set the maximum batching delay in microseconds
    SetBatchLimit(u32),
    /// Transport-specific command
    Raw { cmd: u32, arg: u64 },
}

impl ControlOp {
    /// Short name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            ControlOp::Register(_) => "register",
            ControlOp::AttachIdentity(_) => "attach-identity",
            ControlOp::SetBufferDepth(_) => "set-buffer-depth",
            ControlOp::GetRawState => "get-raw-state",
            ControlOp::SetMinInterval(_) => "set-min-interval",
            ControlOp::SetBatchLimit(_) => "set-batch-limit",
            ControlOp::Raw { .. } => "raw",
        }
    }
}

/// Result of a successful control operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    /// Operation applied (or accepted without effect)
    Done,
    /// Reply to [`ControlOp::GetRawState`]
    State(RawState),
    /// Scalar reply to a [`ControlOp::Raw`] command
    Value(u64),
}

impl ControlReply {
    /// Extract the raw state, failing if the transport replied with something else
    pub fn into_state(self) -> io::Result<RawState> {
        match self {
            ControlReply::State(state) => Ok(state),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected channel state, got {:?}", other),
            )),
        }
    }

    /// Scalar value of the reply; `Done` maps to 0
    pub fn value(&self) -> u64 {
        match self {
            ControlReply::Value(value) => *value,
            _ => 0,
        }
    }
}
