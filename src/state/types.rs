//! Observable topic state

use crate::transport::RawState;

/// Microseconds per second, for interval to frequency conversion
const MICROS_PER_SECOND: u32 = 1_000_000;

/// Topic state derived on demand from the channel's raw state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicState {
    /// Highest publish rate in Hz allowed by the minimum interval, 0 if unset
    pub max_frequency: u32,
    /// Maximum batching delay in microseconds
    pub min_batch_interval: u32,
    /// Buffer depth in element slots
    pub queue_size: u32,
    /// Active subscribers
    pub nsubscribers: u32,
    /// Samples published so far
    pub generation: u64,
}

impl From<RawState> for TopicState {
    fn from(raw: RawState) -> Self {
        Self {
            max_frequency: if raw.min_interval != 0 {
                MICROS_PER_SECOND / raw.min_interval
            } else {
                0
            },
            min_batch_interval: raw.min_latency,
            queue_size: raw.nbuffer,
            nsubscribers: raw.nsubscribers,
            generation: raw.generation,
        }
    }
}
