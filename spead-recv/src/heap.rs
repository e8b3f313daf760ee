//! Packet-driven reassembly of one heap.

use std::collections::HashMap;
use std::sync::Arc;

use spead_codec::{PacketHeader, PointerDecoder};
use spead_core::{
    BugCompatMask, DefaultAllocator, ItemPointer, MemoryAllocator, MemoryChunk, CTRL_STREAM_STOP,
    STREAM_CTRL_ID,
};

/// A heap in the process of being received.
///
/// Any flavour can be used, but all packets in the heap must share the
/// same one; the flavour is locked by the first packet. Once the heap is
/// contiguous it can be converted to a [`FrozenHeap`] for reading.
///
/// A heap can be:
/// - *complete*: a heap-length item was seen and all the corresponding
///   payload has been received; no more packets are expected.
/// - *contiguous*: the received payload covers `[0, min_length)` with no
///   holes and accounts for every item pointer address.
///
/// A complete heap is contiguous, but not necessarily the other way
/// around.
///
/// [`FrozenHeap`]: crate::FrozenHeap
pub struct LiveHeap {
    /// Heap ID encoded in packets.
    pub(crate) cnt: i64,
    /// Declared payload length, or -1 while unknown.
    pub(crate) heap_length: i64,
    /// Bytes of payload received so far.
    pub(crate) received_length: i64,
    /// Lower bound on the payload size implied by packet payload ranges
    /// and item-pointer addresses. Equals `heap_length` once known.
    pub(crate) min_length: i64,
    /// Heap address bits, or -1 until the first packet locks the flavour.
    pub(crate) heap_address_bits: i32,
    /// Protocol bugs to accept.
    pub(crate) bug_compat: BugCompatMask,
    /// True if a stream control item carrying end-of-stream was seen.
    pub(crate) end_of_stream: bool,
    /// Reassembled payload. Grown by doubling while the length is
    /// unknown; growth never zero-fills, so only written regions may be
    /// read back.
    pub(crate) payload: Option<MemoryChunk>,
    pub(crate) payload_reserved: usize,
    /// Item pointers accumulated from packets, in host endian, excluding
    /// the ones decoded into packet-header fields.
    pub(crate) pointers: Vec<ItemPointer>,
    /// Payload extent of each accepted packet, keyed by offset. Detects
    /// duplicates and witnesses contiguity.
    pub(crate) packet_extents: HashMap<i64, i64>,
    pub(crate) allocator: Arc<dyn MemoryAllocator>,
}

impl LiveHeap {
    /// Create an empty heap for the given ID.
    #[must_use]
    pub fn new(cnt: i64, bug_compat: BugCompatMask) -> Self {
        Self {
            cnt,
            heap_length: -1,
            received_length: 0,
            min_length: 0,
            heap_address_bits: -1,
            bug_compat,
            end_of_stream: false,
            payload: None,
            payload_reserved: 0,
            pointers: Vec::new(),
            packet_extents: HashMap::new(),
            allocator: Arc::new(DefaultAllocator),
        }
    }

    /// Use `allocator` for payload memory instead of plain allocation.
    /// Must be called before the first packet is added.
    pub fn set_allocator(&mut self, allocator: Arc<dyn MemoryAllocator>) {
        self.allocator = allocator;
    }

    /// Make sure at least `size` bytes of payload are reserved. When
    /// `exact` is false a doubling heuristic is applied.
    fn payload_reserve(&mut self, size: usize, exact: bool) {
        if size <= self.payload_reserved {
            return;
        }
        let mut alloc_size = size;
        if !exact && alloc_size < self.payload_reserved * 2 {
            alloc_size = self.payload_reserved * 2;
        }
        let mut chunk = self.allocator.allocate(alloc_size);
        if let Some(old) = self.payload.take() {
            chunk.copy_from(&old);
        }
        self.payload_reserved = chunk.len();
        self.payload = Some(chunk);
    }

    /// Attempt to add a decoded packet to the heap. Returns `true` if the
    /// packet was consumed. A packet that passed [`decode_packet`] can
    /// still be rejected here, leaving the heap unchanged:
    /// - wrong heap ID
    /// - flavour differs from the one locked by the first packet
    /// - heap length disagrees with a previously seen one
    /// - payload range extends beyond the declared heap length
    /// - duplicate payload offset
    ///
    /// [`decode_packet`]: spead_codec::decode_packet
    pub fn add_packet(&mut self, packet: &PacketHeader<'_>) -> bool {
        if self.cnt != packet.heap_cnt {
            return false;
        }
        if self.heap_address_bits >= 0 && packet.heap_address_bits != self.heap_address_bits as u32
        {
            tracing::debug!(
                heap_cnt = self.cnt,
                "packet rejected: flavour differs from the rest of the heap"
            );
            return false;
        }
        if self.heap_length >= 0 && packet.heap_length >= 0 && packet.heap_length != self.heap_length
        {
            tracing::debug!(heap_cnt = self.cnt, "packet rejected: inconsistent heap length");
            return false;
        }
        let length_bound = if self.heap_length >= 0 {
            self.heap_length
        } else {
            packet.heap_length
        };
        if length_bound >= 0 && packet.payload_offset + packet.payload_length > length_bound {
            tracing::debug!(heap_cnt = self.cnt, "packet rejected: payload overruns heap");
            return false;
        }
        if self.packet_extents.contains_key(&packet.payload_offset) {
            tracing::debug!(heap_cnt = self.cnt, "packet rejected: duplicate");
            return false;
        }

        // Packet is accepted; update heap state
        self.packet_extents
            .insert(packet.payload_offset, packet.payload_length);
        if self.heap_address_bits < 0 {
            self.heap_address_bits = packet.heap_address_bits as i32;
        }
        if packet.heap_length >= 0 && self.heap_length < 0 {
            self.heap_length = packet.heap_length;
            self.min_length = self.min_length.max(self.heap_length);
            self.payload_reserve(self.min_length as usize, true);
        } else {
            self.min_length = self
                .min_length
                .max(packet.payload_offset + packet.payload_length);
            self.payload_reserve(self.min_length as usize, false);
        }

        let decoder = PointerDecoder::new(self.heap_address_bits as u32);
        for pointer in packet.item_pointers() {
            if decoder.is_immediate(pointer) {
                if decoder.id(pointer) == STREAM_CTRL_ID
                    && decoder.value(pointer) == CTRL_STREAM_STOP
                {
                    self.end_of_stream = true;
                }
            } else {
                self.min_length = self.min_length.max(decoder.value(pointer) as i64);
            }
            self.pointers.push(pointer);
        }

        if packet.payload_length > 0 {
            let payload = self.payload.as_mut().expect("payload reserved above");
            payload.write(packet.payload_offset as usize, packet.payload);
            self.received_length += packet.payload_length;
        }
        tracing::trace!(
            heap_cnt = self.cnt,
            received = self.received_length,
            "packet accepted"
        );
        true
    }

    /// True if the declared heap length is known and fully received.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.heap_length >= 0 && self.received_length == self.heap_length
    }

    /// True if the accepted payload extents tile `[0, min_length)` with
    /// no holes. Only contiguous heaps can be frozen.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        if self.received_length != self.min_length {
            return false;
        }
        let mut extents: Vec<(i64, i64)> = self
            .packet_extents
            .iter()
            .map(|(&offset, &length)| (offset, length))
            .collect();
        extents.sort_unstable();
        let mut cursor = 0;
        for (offset, length) in extents {
            if offset != cursor {
                return false;
            }
            cursor += length;
        }
        cursor == self.min_length
    }

    /// True if a stream control item carrying end-of-stream was seen.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Heap ID.
    #[must_use]
    pub fn cnt(&self) -> i64 {
        self.cnt
    }

    /// Protocol bug compatibility flags.
    #[must_use]
    pub fn bug_compat(&self) -> BugCompatMask {
        self.bug_compat
    }

    /// Declared total payload length, if a `HEAP_LENGTH` item has been
    /// seen.
    #[must_use]
    pub fn heap_length(&self) -> Option<i64> {
        (self.heap_length >= 0).then_some(self.heap_length)
    }

    /// Bytes of payload received so far.
    #[must_use]
    pub fn received_length(&self) -> i64 {
        self.received_length
    }

    /// Heap address bits locked by the first packet.
    #[must_use]
    pub fn heap_address_bits(&self) -> Option<u32> {
        (self.heap_address_bits >= 0).then_some(self.heap_address_bits as u32)
    }
}
