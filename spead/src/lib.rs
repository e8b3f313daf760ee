//! # spead
//!
//! An engine for the SPEAD (Streaming Protocol for Exchanging
//! Astronomical Data) wire protocol: a UDP-oriented binary protocol that
//! moves heterogeneous arrays of scientific data in self-describing
//! bundles called *heaps*, sliced across packets.
//!
//! This umbrella crate re-exports the whole engine:
//!
//! - [`spead-core`](spead_core) - flavour, errors, descriptors, memory,
//!   ring buffer, worker pool
//! - [`spead-codec`](spead_codec) - bit-exact packet, pointer, and
//!   descriptor codecs
//! - [`spead-recv`](spead_recv) - heap reassembly and strand-serialized
//!   receive streams
//! - [`spead-send`](spead_send) - heap assembly and packetization
//!
//! ## Receiving
//!
//! ```rust,no_run
//! use spead::{BufferReader, RingStream, StreamConfig, ThreadPool};
//!
//! let pool = ThreadPool::new(2).unwrap();
//! let stream = RingStream::new(&pool, StreamConfig::new(), 16);
//! stream.add_reader(BufferReader::new(std::fs::read("capture.bin").unwrap()));
//! while let Ok(heap) = stream.pop() {
//!     println!("heap {}: {} bytes", heap.cnt(), heap.payload().len());
//! }
//! ```
//!
//! ## Sending
//!
//! ```rust
//! use spead::{Flavour, SendHeap, DEFAULT_MAX_PACKET_SIZE};
//!
//! let mut heap = SendHeap::new(1, Flavour::default());
//! heap.add_item(0x1000, vec![0u8; 1024], false).unwrap();
//! for packet in heap.packets(DEFAULT_MAX_PACKET_SIZE).unwrap() {
//!     // hand the packet to a transport
//!     let _ = packet;
//! }
//! ```

// Core types
pub use spead_core::{
    BugCompatMask, CodecError, DefaultAllocator, Descriptor, Flavour, ItemPointer,
    MemoryAllocator, MemoryChunk, MemoryPool, RingError, RingPushError, Ringbuffer, SpeadError,
    ThreadPool,
};

// Protocol constants
pub use spead_core::{
    BUG_COMPAT_DESCRIPTOR_WIDTHS, BUG_COMPAT_SHAPE_BIT_1, CTRL_STREAM_STOP, DESCRIPTOR_ID,
    HEAP_CNT_ID, HEAP_LENGTH_ID, ITEM_POINTER_SIZE, MAGIC, PAYLOAD_LENGTH_ID, PAYLOAD_OFFSET_ID,
    STREAM_CTRL_ID,
};

// Codec
pub use spead_codec::{
    decode_descriptor, decode_packet, encode_descriptor, encode_packet, PacketHeader,
    PointerDecoder, PointerEncoder,
};

// Receive side
pub use spead_recv::{
    mem_to_stream, BufferReader, FrozenHeap, HeapItem, HeapSink, ItemValue, LiveHeap, NullSink,
    Reader, RingStream, Strand, Stream, StreamBase, StreamConfig, StreamInner, DEFAULT_MAX_HEAPS,
};

// Send side
pub use spead_send::{PacketGenerator, SendHeap, SendItem, DEFAULT_MAX_PACKET_SIZE};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
