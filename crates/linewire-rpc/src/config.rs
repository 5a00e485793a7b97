use std::time::Duration;

use linewire_frame::{FrameConfig, DEFAULT_MAX_FRAME_SIZE};

use crate::decoder::DEFAULT_DIAGNOSTIC_LIMIT;

/// Default cap on concurrently running handlers per session.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Default number of responses that may wait for the writer.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 256;

/// Per-session connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Longest accepted input line in bytes. Longer lines end the session.
    pub max_frame_size: usize,
    /// Input is not read while this many handlers are pending.
    pub max_in_flight: usize,
    /// Capacity of the bounded queue in front of the response writer.
    pub write_queue_capacity: usize,
    /// How long to wait for pending handlers once input ends. `None` waits forever.
    pub shutdown_timeout: Option<Duration>,
    /// Bytes of a malformed frame quoted back in `ParseError` data.
    pub diagnostic_frame_limit: usize,
}

impl ConnectorConfig {
    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
        }
    }

    // Zero would stall the session (or panic the channel); treat it as one.
    pub(crate) fn effective_max_in_flight(&self) -> usize {
        self.max_in_flight.max(1)
    }

    pub(crate) fn effective_write_queue_capacity(&self) -> usize {
        self.write_queue_capacity.max(1)
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            shutdown_timeout: None,
            diagnostic_frame_limit: DEFAULT_DIAGNOSTIC_LIMIT,
        }
    }
}
