//! # Seurat - In-Process Marked Byte-Stream Fabric
//!
//! Seurat lets many concurrent writers and readers exchange variable-sized,
//! atomically-delivered message bursts through a shared pool of
//! fixed-capacity byte buffers, without per-message allocation and without
//! copying payloads across the producer/consumer boundary.
//!
//! ## Features
//!
//! - **Marked buffers**: a third cursor delimits logical blocks, so a block
//!   never straddles a buffer boundary as seen by readers
//! - **Lock-free handoff**: filled buffers migrate through a bounded FIFO,
//!   empty buffers recycle through a bounded pool
//! - **Adaptive backpressure**: producers sleep with the cube of pool
//!   overshoot, so the hot path stays wait-free until pressure builds
//! - **Typed endpoints**: `StreamWriter` and `StreamReader` make the role
//!   part of the type; a single endpoint can never be both
//! - **Observable**: every component carries counters and a `state()`
//!   rendering for logs
//!
//! ## Architecture
//!
//! ```text
//!  StreamWriter ──┐                       ┌── StreamReader
//!  StreamWriter ──┤   push    BufferFifo  │
//!       ...       ├────────▶ [##][##][##]─┴──▶ pop
//!  StreamWriter ──┘              │ ▲
//!                        release ▼ │ acquire
//!                           BufferPool
//!                          [  ][  ][  ]
//! ```
//!
//! Each endpoint is thread-affine; the fifo and pool are shared. A writer
//! accumulates bytes in a private buffer and calls
//! [`set_mark`](stream::StreamWriter::set_mark) at block boundaries. On
//! overflow the pending tail past the last mark migrates to a fresh buffer
//! before the old one is published, which is what makes block delivery
//! atomic.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use seurat::{BufferFifo, FifoConfig, StreamReader, StreamWriter};
//!
//! let fifo = Arc::new(BufferFifo::new(FifoConfig::default()).unwrap());
//!
//! let mut writer = StreamWriter::new(Arc::clone(&fifo));
//! writer.write(b"one message");
//! writer.set_mark(false);
//! writer.flush();
//! drop(writer);
//! fifo.set_eof();
//!
//! let mut reader = StreamReader::new(Arc::clone(&fifo));
//! let mut out = [0u8; 11];
//! while reader.is_ready(true) {
//!     reader.read(&mut out);
//! }
//! assert_eq!(&out, b"one message");
//! ```

// Core modules
pub mod buffers;
pub mod error;
pub mod fifo;
pub mod stream;
pub mod sync;

// Main API re-exports
pub use buffers::{Buffer, BufferPool, PoolStats, PoolStatsSnapshot};
pub use error::{Result, SeuratError};
pub use fifo::{BufferFifo, FifoConfig, FifoStats, FifoStatsSnapshot};
pub use stream::{StreamReader, StreamWriter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod defaults {
    /// Default target capacity of each buffer (bytes)
    pub const BUFFER_SIZE: usize = 8192;

    /// Default capacity of the queue of filled buffers
    pub const NUM_BUFFERS: usize = 256;

    /// Default free-list multiplier: pool capacity = num_buffers * this
    pub const POOL_MULTIPLIER: usize = 3;

    /// Default outstanding-buffer warning multiple
    pub const WARNING_THRESHOLD: u64 = 4;
}
