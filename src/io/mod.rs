//! I/O utilities for ipwkit
//!
//! Provides byte order handling, bit-level sample cursors and input buffers.

pub mod byte_order;
pub mod bits;
pub mod source;

pub use byte_order::{ByteOrder, ByteOrderHandler};
pub use bits::{BitCursor, BitWriter};
pub use source::InputBuffer;
