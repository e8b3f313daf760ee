//! # spead-core
//!
//! Core types for the SPEAD (Streaming Protocol for Exchanging
//! Astronomical Data) protocol engine.
//!
//! This crate provides:
//! - Protocol constants and the [`Flavour`] that parameterizes the wire
//!   format (pointer width, heap address bits, bug-compatibility mask)
//! - Error types ([`SpeadError`], [`CodecError`], [`RingError`])
//! - The item [`Descriptor`] model
//! - Payload memory management ([`MemoryAllocator`], [`MemoryPool`])
//! - A bounded [`Ringbuffer`] for handing finished heaps to consumers
//! - The shared [`ThreadPool`] worker executor

mod defines;
mod descriptor;
mod error;
mod memory;
mod ring;
mod thread_pool;

pub use defines::{
    BugCompatMask, Flavour, ItemPointer, BUG_COMPAT_DESCRIPTOR_WIDTHS, BUG_COMPAT_SHAPE_BIT_1,
    CTRL_STREAM_STOP, DESCRIPTOR_DESCRIPTION_ID, DESCRIPTOR_DTYPE_ID, DESCRIPTOR_FORMAT_ID,
    DESCRIPTOR_ID, DESCRIPTOR_ID_ID, DESCRIPTOR_NAME_ID, DESCRIPTOR_SHAPE_ID, HEAP_CNT_ID,
    HEAP_LENGTH_ID, ITEM_POINTER_SIZE, MAGIC, PAYLOAD_LENGTH_ID, PAYLOAD_OFFSET_ID,
    STREAM_CTRL_ID,
};
pub use descriptor::Descriptor;
pub use error::{CodecError, RingError, RingPushError, SpeadError};
pub use memory::{DefaultAllocator, MemoryAllocator, MemoryChunk, MemoryPool};
pub use ring::Ringbuffer;
pub use thread_pool::ThreadPool;
