//! The stream state machine: dispatches packets to live heaps.

use std::collections::VecDeque;
use std::sync::Arc;

use spead_codec::{decode_packet, PacketHeader};
use spead_core::{BugCompatMask, DefaultAllocator, MemoryAllocator};

use crate::heap::LiveHeap;

/// Default cap on in-flight heaps.
pub const DEFAULT_MAX_HEAPS: usize = 4;

/// Receives ownership of each heap ejected from the live collection.
///
/// The heap may or may not be complete: completion, age-out, and stream
/// shutdown all deliver through the same operation. All calls happen on
/// the stream's serialization context.
pub trait HeapSink: Send {
    /// Take delivery of one heap.
    fn heap_ready(&mut self, heap: LiveHeap);

    /// Called once when the stream stops, after the final flush.
    fn stream_stopped(&mut self) {}
}

/// Sink that discards every heap (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl HeapSink for NullSink {
    fn heap_ready(&mut self, _heap: LiveHeap) {}
}

/// Configuration for a receive stream.
///
/// ## Example
///
/// ```rust
/// use spead_recv::StreamConfig;
/// use spead_core::BUG_COMPAT_SHAPE_BIT_1;
///
/// let config = StreamConfig::new()
///     .bug_compat(BUG_COMPAT_SHAPE_BIT_1)
///     .max_heaps(16);
/// assert_eq!(config.max_heaps, 16);
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Protocol bugs to be compatible with.
    pub bug_compat: BugCompatMask,

    /// Maximum number of in-flight heaps. One more may be present
    /// transiently while the oldest is being ejected.
    pub max_heaps: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bug_compat: 0,
            max_heaps: DEFAULT_MAX_HEAPS,
        }
    }
}

impl StreamConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bug-compatibility mask.
    #[must_use]
    pub fn bug_compat(mut self, bug_compat: BugCompatMask) -> Self {
        self.bug_compat = bug_compat;
        self
    }

    /// Set the live-heap cap.
    #[must_use]
    pub fn max_heaps(mut self, max_heaps: usize) -> Self {
        self.max_heaps = max_heaps;
        self
    }
}

/// A SPEAD stream's packet-dispatch state machine.
///
/// Packets are fed in through [`StreamBase::add_packet`]. A bounded
/// collection of partial heaps is kept, ordered by heap ID. Heaps leave
/// the collection, and are handed to the [`HeapSink`], when
/// - they are known to be complete; or
/// - too many heaps are live: the one with the lowest ID is aged out,
///   even if incomplete; or
/// - the stream is stopped.
///
/// This type is not thread-safe; [`Stream`] wraps it in a strand for
/// concurrent use.
///
/// [`Stream`]: crate::Stream
pub struct StreamBase {
    /// Cap on live heaps; one more may exist momentarily before the
    /// oldest is ejected.
    max_heaps: usize,
    /// Live heaps, ordered by heap ID ascending.
    heaps: VecDeque<LiveHeap>,
    /// Set by [`StreamBase::stop`], externally or by stream control.
    stopped: bool,
    bug_compat: BugCompatMask,
    /// Allocator handed to new heaps.
    allocator: Arc<dyn MemoryAllocator>,
    sink: Box<dyn HeapSink>,
}

impl StreamBase {
    /// Create a stream delivering heaps to `sink`.
    #[must_use]
    pub fn new(config: StreamConfig, sink: Box<dyn HeapSink>) -> Self {
        Self {
            max_heaps: config.max_heaps,
            heaps: VecDeque::new(),
            stopped: false,
            bug_compat: config.bug_compat,
            allocator: Arc::new(DefaultAllocator),
            sink,
        }
    }

    /// Change the live-heap cap. Lowering the cap does not eject heaps
    /// immediately; the new cap applies from the next insertion.
    pub fn set_max_heaps(&mut self, max_heaps: usize) {
        self.max_heaps = max_heaps;
    }

    /// Use `allocator` for the payload memory of heaps created from now
    /// on.
    pub fn set_allocator(&mut self, allocator: Arc<dyn MemoryAllocator>) {
        self.allocator = allocator;
    }

    /// Dispatch a decoded packet to its heap, creating the heap on first
    /// contact. Returns `true` if some heap consumed the packet.
    ///
    /// Calling this on a stopped stream is a caller error: it panics in
    /// debug builds and returns `false` in release builds.
    pub fn add_packet(&mut self, packet: &PacketHeader<'_>) -> bool {
        debug_assert!(!self.stopped, "add_packet called on a stopped stream");
        if self.stopped {
            return false;
        }
        let mut result = false;
        let mut end_of_stream = false;
        let mut found = None;
        let mut insert_at = 0;
        for (index, heap) in self.heaps.iter().enumerate() {
            if heap.cnt() == packet.heap_cnt {
                found = Some(index);
                break;
            } else if heap.cnt() < packet.heap_cnt {
                insert_at = index + 1;
            }
        }

        if let Some(index) = found {
            let heap = &mut self.heaps[index];
            if heap.add_packet(packet) {
                result = true;
                end_of_stream = heap.is_end_of_stream();
                if heap.is_complete() {
                    let heap = self.heaps.remove(index).expect("index is in range");
                    self.sink.heap_ready(heap);
                }
            }
        } else {
            // First packet of a heap we have not seen before
            let mut heap = LiveHeap::new(packet.heap_cnt, self.bug_compat);
            heap.set_allocator(self.allocator.clone());
            if heap.add_packet(packet) {
                result = true;
                end_of_stream = heap.is_end_of_stream();
                if heap.is_complete() {
                    self.sink.heap_ready(heap);
                } else {
                    self.heaps.insert(insert_at, heap);
                    if self.heaps.len() > self.max_heaps {
                        // Too many live heaps: eject the lowest ID, even
                        // if incomplete
                        let oldest = self.heaps.pop_front().expect("collection is non-empty");
                        tracing::debug!(heap_cnt = oldest.cnt(), "aging out incomplete heap");
                        self.sink.heap_ready(oldest);
                    }
                }
            }
        }
        if end_of_stream {
            self.stop();
        }
        result
    }

    /// Deliver every live heap to the sink in ascending-ID order and
    /// clear the collection.
    pub fn flush(&mut self) {
        for heap in std::mem::take(&mut self.heaps) {
            self.sink.heap_ready(heap);
        }
    }

    /// Shut the stream down, flushing live heaps. Idempotent.
    pub fn stop(&mut self) {
        let first = !self.stopped;
        self.stopped = true;
        self.flush();
        if first {
            tracing::debug!("stream stopped");
            self.sink.stream_stopped();
        }
    }

    /// True once [`StreamBase::stop`] has run.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Protocol bug compatibility flags.
    #[must_use]
    pub fn bug_compat(&self) -> BugCompatMask {
        self.bug_compat
    }

    /// Number of heaps currently in flight.
    #[must_use]
    pub fn live_heaps(&self) -> usize {
        self.heaps.len()
    }
}

/// Push the packets found in a block of memory into a stream.
///
/// Returns the number of bytes consumed. Scanning stops at the first
/// undecodable packet (there is no way to find the next packet after a
/// corrupt one) or when the stream stops; individual packets may still
/// be rejected by their heap without ending the scan. The stream itself
/// is not stopped by exhausting the block.
pub fn mem_to_stream(stream: &mut StreamBase, data: &[u8]) -> usize {
    let mut offset = 0;
    while offset < data.len() && !stream.is_stopped() {
        match decode_packet(&data[offset..]) {
            Ok((packet, consumed)) => {
                stream.add_packet(&packet);
                offset += consumed;
            }
            Err(err) => {
                tracing::debug!(%err, offset, "stopping scan at undecodable packet");
                break;
            }
        }
    }
    offset
}
