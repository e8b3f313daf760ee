//! # spead-recv
//!
//! Receive side of the SPEAD protocol engine.
//!
//! This crate provides:
//! - [`LiveHeap`] - packet-driven reassembly of one heap
//! - [`FrozenHeap`] - an immutable reassembled heap with item access
//! - [`StreamBase`] - the packet-dispatch state machine with a bounded
//!   live-heap collection and a [`HeapSink`]
//! - [`Stream`] - a stream whose state is serialized through a per-stream
//!   [`Strand`] on a shared worker pool
//! - [`RingStream`] - a stream that parks frozen heaps on a ring buffer
//! - [`Reader`] - the contract for packet sources, with [`BufferReader`]
//!   as the in-memory implementation
//!
//! ## Receive path
//!
//! ```text
//! bytes -> decode_packet -> StreamBase -> LiveHeap -> (complete or aged
//! out) -> HeapSink -> FrozenHeap -> Ringbuffer -> consumer
//! ```

mod frozen;
mod heap;
mod reader;
mod ring_stream;
mod strand;
mod stream;

#[cfg(test)]
mod test_util;

pub use frozen::{FrozenHeap, HeapItem, ItemValue};
pub use heap::LiveHeap;
pub use reader::{BufferReader, Reader};
pub use ring_stream::RingStream;
pub use strand::{Strand, Stream, StreamInner};
pub use stream::{mem_to_stream, HeapSink, NullSink, StreamBase, StreamConfig, DEFAULT_MAX_HEAPS};
