//! Stream variant that parks finished heaps on a ring buffer.

use std::sync::Arc;

use spead_core::{MemoryAllocator, RingError, Ringbuffer, ThreadPool};

use crate::frozen::FrozenHeap;
use crate::heap::LiveHeap;
use crate::reader::Reader;
use crate::strand::Stream;
use crate::stream::{HeapSink, StreamConfig};

/// Sink that freezes contiguous heaps onto a ring buffer.
struct RingSink {
    ring: Arc<Ringbuffer<FrozenHeap>>,
}

impl HeapSink for RingSink {
    fn heap_ready(&mut self, heap: LiveHeap) {
        let cnt = heap.cnt();
        match FrozenHeap::try_from(heap) {
            Ok(frozen) => {
                if self.ring.try_push(frozen).is_err() {
                    tracing::warn!(heap_cnt = cnt, "dropping heap: ring buffer full or stopped");
                }
            }
            Err(_) => {
                tracing::warn!(heap_cnt = cnt, "dropping non-contiguous heap");
            }
        }
    }

    fn stream_stopped(&mut self) {
        // Wake consumers blocked in pop
        self.ring.stop();
    }
}

/// A receive stream whose completed heaps are frozen and queued for a
/// consumer.
///
/// Heaps that leave the stream contiguous are frozen and pushed onto a
/// bounded ring buffer; non-contiguous heaps (age-outs with holes) are
/// dropped with a warning. When the stream stops, for any reason, the
/// ring stops too, so consumers blocked in [`RingStream::pop`] wake up
/// once the queue drains.
///
/// ## Example
///
/// ```rust,no_run
/// use spead_core::ThreadPool;
/// use spead_recv::{BufferReader, RingStream, StreamConfig};
///
/// let pool = ThreadPool::new(2).unwrap();
/// let stream = RingStream::new(&pool, StreamConfig::new(), 16);
/// stream.add_reader(BufferReader::new(Vec::new()));
/// while let Ok(heap) = stream.pop() {
///     println!("heap {} with {} bytes", heap.cnt(), heap.payload().len());
/// }
/// ```
pub struct RingStream {
    stream: Stream,
    ring: Arc<Ringbuffer<FrozenHeap>>,
}

impl RingStream {
    /// Create a ring-fronted stream with space for `ring_capacity`
    /// finished heaps.
    #[must_use]
    pub fn new(pool: &ThreadPool, config: StreamConfig, ring_capacity: usize) -> Self {
        let ring = Arc::new(Ringbuffer::new(ring_capacity));
        let sink = RingSink {
            ring: Arc::clone(&ring),
        };
        Self {
            stream: Stream::new(pool, config, sink),
            ring,
        }
    }

    /// Attach and start a reader.
    pub fn add_reader<R: Reader>(&self, reader: R) {
        self.stream.add_reader(reader);
    }

    /// Change the live-heap cap.
    pub fn set_max_heaps(&self, max_heaps: usize) {
        self.stream.set_max_heaps(max_heaps);
    }

    /// Use `allocator` for the payload memory of new heaps.
    pub fn set_allocator(&self, allocator: Arc<dyn MemoryAllocator>) {
        self.stream.set_allocator(allocator);
    }

    /// Take the next finished heap, blocking until one is available.
    /// Returns [`RingError::Stopped`] once the stream has stopped and
    /// the queue has drained.
    pub fn pop(&self) -> Result<FrozenHeap, RingError> {
        self.ring.pop()
    }

    /// Take the next finished heap without blocking.
    pub fn try_pop(&self) -> Result<FrozenHeap, RingError> {
        self.ring.try_pop()
    }

    /// Shut the stream down and stop the ring. Blocks until the stream's
    /// readers and heaps are flushed. Idempotent.
    pub fn stop(&self) {
        self.stream.stop();
        self.ring.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::reader::BufferReader;
    use crate::test_util::{data_packet, data_packet_no_length, end_packet};

    #[test]
    fn test_heaps_arrive_in_completion_order() {
        let pool = ThreadPool::new(2).unwrap();
        let stream = RingStream::new(&pool, StreamConfig::new(), 16);

        let mut data = Vec::new();
        // Heap 2 completes before heap 1
        data.extend_from_slice(&data_packet(1, 16, 0, b"aaaaaaaa"));
        data.extend_from_slice(&data_packet(2, 8, 0, b"bbbbbbbb"));
        data.extend_from_slice(&data_packet(1, 16, 8, b"AAAAAAAA"));
        data.extend_from_slice(&end_packet(3));
        stream.add_reader(BufferReader::new(data));

        let first = stream.pop().unwrap();
        assert_eq!(first.cnt(), 2);
        assert_eq!(first.payload(), b"bbbbbbbb");
        let second = stream.pop().unwrap();
        assert_eq!(second.cnt(), 1);
        assert_eq!(second.payload(), b"aaaaaaaaAAAAAAAA");
        // The end-of-stream heap is itself delivered, then the ring stops
        assert_eq!(stream.pop().unwrap().cnt(), 3);
        assert!(matches!(stream.pop(), Err(RingError::Stopped)));
    }

    #[test]
    fn test_contiguous_partial_heap_delivered_on_stop() {
        let pool = ThreadPool::new(1).unwrap();
        let stream = RingStream::new(&pool, StreamConfig::new(), 4);
        // No heap length was ever declared, so the contiguous prefix is
        // all the heap will ever be; it freezes cleanly on flush
        stream.add_reader(BufferReader::new(
            data_packet_no_length(1, 0, b"aaaaaaaa").freeze(),
        ));
        stream.stop();
        let heap = stream.pop().unwrap();
        assert_eq!(heap.cnt(), 1);
        assert_eq!(heap.payload(), b"aaaaaaaa");
        assert!(matches!(stream.pop(), Err(RingError::Stopped)));
    }

    #[test]
    fn test_heap_with_hole_dropped_on_stop() {
        let pool = ThreadPool::new(1).unwrap();
        let stream = RingStream::new(&pool, StreamConfig::new(), 4);
        // Payload at [8, 16) with nothing at [0, 8): cannot be frozen
        stream.add_reader(BufferReader::new(data_packet(1, 16, 8, b"aaaaaaaa").freeze()));
        stream.stop();
        assert!(matches!(stream.pop(), Err(RingError::Stopped)));
    }

    #[test]
    fn test_try_pop_empty() {
        let pool = ThreadPool::new(1).unwrap();
        let stream = RingStream::new(&pool, StreamConfig::new(), 4);
        assert_eq!(stream.try_pop().err(), Some(RingError::Empty));
        stream.stop();
    }
}
