// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for handles and flow-control buffers.

use std::time::Duration;

/// Configuration of a [`Handle`](crate::Handle).
#[derive(Clone, Debug)]
pub struct HandleConfig {
    /// One polling quantum when waiting for a local acknowledgement,
    /// for example during cache invalidation.
    pub short_timeout: Duration,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            short_timeout: Duration::from_millis(300),
        }
    }
}

/// Configuration of a [`FlowControl`](crate::FlowControl) buffer.
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// Maximum number of buffered objects awaiting an interest.
    pub capacity: usize,

    /// Retention window after which a buffered object nobody asked for
    /// is evicted as unclaimed.
    pub window: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            window: Duration::from_secs(10),
        }
    }
}
