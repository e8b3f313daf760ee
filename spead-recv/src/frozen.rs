//! Immutable reassembled heaps and item extraction.

use spead_codec::{decode_descriptor, PointerDecoder};
use spead_core::{
    BugCompatMask, Descriptor, ItemPointer, MemoryChunk, SpeadError, DESCRIPTOR_ID,
};

use crate::heap::LiveHeap;

/// A fully reassembled, immutable heap.
///
/// Produced from a contiguous [`LiveHeap`]; owns the payload buffer and
/// the accumulated item pointers. Items are exposed as byte slices or
/// immediate values; typed interpretation belongs to a higher layer.
#[derive(Debug)]
pub struct FrozenHeap {
    cnt: i64,
    heap_address_bits: u32,
    bug_compat: BugCompatMask,
    payload: Option<MemoryChunk>,
    payload_length: usize,
    pointers: Vec<ItemPointer>,
}

/// One decoded item of a frozen heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapItem<'heap> {
    /// Item ID.
    pub id: u64,
    /// The item's content.
    pub value: ItemValue<'heap>,
}

/// Content of one heap item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemValue<'heap> {
    /// Value stored directly in the item pointer.
    Immediate(u64),
    /// Slice of the heap payload.
    Bytes(&'heap [u8]),
}

impl TryFrom<LiveHeap> for FrozenHeap {
    type Error = SpeadError;

    /// Freeze a contiguous heap. Fails if the heap has holes or has not
    /// received any packet.
    fn try_from(mut heap: LiveHeap) -> Result<Self, Self::Error> {
        if heap.heap_address_bits < 0 {
            return Err(SpeadError::InvalidArgument(
                "cannot freeze a heap with no packets".into(),
            ));
        }
        if !heap.is_contiguous() {
            return Err(SpeadError::InvalidArgument(
                "cannot freeze a non-contiguous heap".into(),
            ));
        }
        Ok(Self {
            cnt: heap.cnt,
            heap_address_bits: heap.heap_address_bits as u32,
            bug_compat: heap.bug_compat,
            payload: heap.payload.take(),
            payload_length: heap.min_length as usize,
            pointers: std::mem::take(&mut heap.pointers),
        })
    }
}

impl FrozenHeap {
    /// Heap ID.
    #[must_use]
    pub fn cnt(&self) -> i64 {
        self.cnt
    }

    /// Heap address bits of the flavour the heap was received with.
    #[must_use]
    pub fn heap_address_bits(&self) -> u32 {
        self.heap_address_bits
    }

    /// The reassembled payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match &self.payload {
            // Contiguity was checked when freezing: every byte below
            // payload_length has been written
            Some(chunk) => unsafe { chunk.assume_init(self.payload_length) },
            None => &[],
        }
    }

    /// Decode the heap's items. An addressed item's slice runs from its
    /// address to the next item address (or the end of the payload).
    #[must_use]
    pub fn items(&self) -> Vec<HeapItem<'_>> {
        let decoder = PointerDecoder::new(self.heap_address_bits);
        let payload = self.payload();

        let mut addresses: Vec<u64> = self
            .pointers
            .iter()
            .filter(|&&pointer| !decoder.is_immediate(pointer))
            .map(|&pointer| decoder.value(pointer))
            .collect();
        addresses.sort_unstable();

        self.pointers
            .iter()
            .map(|&pointer| {
                let id = decoder.id(pointer);
                if decoder.is_immediate(pointer) {
                    HeapItem {
                        id,
                        value: ItemValue::Immediate(decoder.value(pointer)),
                    }
                } else {
                    let start = decoder.value(pointer) as usize;
                    let end = addresses
                        .iter()
                        .find(|&&address| address as usize > start)
                        .map_or(payload.len(), |&address| address as usize);
                    HeapItem {
                        id,
                        value: ItemValue::Bytes(&payload[start..end]),
                    }
                }
            })
            .collect()
    }

    /// Decode the descriptors embedded in the heap. Malformed descriptor
    /// blobs are dropped with a warning.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.items()
            .iter()
            .filter(|item| item.id == DESCRIPTOR_ID)
            .filter_map(|item| match item.value {
                ItemValue::Bytes(blob) => match decode_descriptor(blob, self.bug_compat) {
                    Ok(descriptor) => Some(descriptor),
                    Err(err) => {
                        tracing::warn!(heap_cnt = self.cnt, %err, "dropping malformed descriptor");
                        None
                    }
                },
                ItemValue::Immediate(_) => None,
            })
            .collect()
    }
}
