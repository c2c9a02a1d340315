//! Stream fabric configuration

use crate::defaults;
use crate::error::{Result, SeuratError};

/// Construction-time options for a [`BufferFifo`](crate::fifo::BufferFifo)
/// and its embedded pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoConfig {
    /// Target capacity of each buffer in bytes. Should comfortably exceed
    /// the largest single message plus framing overhead.
    pub buffer_size: usize,
    /// Capacity of the queue of filled buffers; baseline for pool sizing.
    pub num_buffers: usize,
    /// Free-list capacity is `num_buffers * pool_multiplier`.
    pub pool_multiplier: usize,
    /// Multiple of pool capacity at which the outstanding-buffer warning
    /// fires; doubles after each firing.
    pub warning_threshold: u64,
    /// Fill the free list with `num_buffers` buffers up front.
    pub pre_allocate: bool,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            buffer_size: defaults::BUFFER_SIZE,
            num_buffers: defaults::NUM_BUFFERS,
            pool_multiplier: defaults::POOL_MULTIPLIER,
            warning_threshold: defaults::WARNING_THRESHOLD,
            pre_allocate: false,
        }
    }
}

impl FifoConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the queue capacity
    pub fn with_num_buffers(mut self, count: usize) -> Self {
        self.num_buffers = count;
        self
    }

    /// Set the free-list multiplier
    pub fn with_pool_multiplier(mut self, multiplier: usize) -> Self {
        self.pool_multiplier = multiplier;
        self
    }

    /// Set the initial outstanding-buffer warning threshold
    pub fn with_warning_threshold(mut self, threshold: u64) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// Enable or disable up-front allocation
    pub fn with_pre_allocate(mut self, pre_allocate: bool) -> Self {
        self.pre_allocate = pre_allocate;
        self
    }

    /// Free-list capacity derived from the queue capacity
    pub fn pool_capacity(&self) -> usize {
        self.num_buffers * self.pool_multiplier
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(SeuratError::invalid_parameter(
                "buffer_size",
                "cannot be zero",
            ));
        }
        if self.num_buffers == 0 {
            return Err(SeuratError::invalid_parameter(
                "num_buffers",
                "cannot be zero",
            ));
        }
        if self.pool_multiplier == 0 {
            return Err(SeuratError::invalid_parameter(
                "pool_multiplier",
                "cannot be zero",
            ));
        }
        if self.warning_threshold == 0 {
            return Err(SeuratError::invalid_parameter(
                "warning_threshold",
                "cannot be zero",
            ));
        }
        Ok(())
    }
}
