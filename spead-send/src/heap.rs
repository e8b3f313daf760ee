//! Assembly of heaps for transmission.

use ntex_bytes::Bytes;

use spead_codec::encode_descriptor;
use spead_core::{
    Descriptor, Flavour, SpeadError, CTRL_STREAM_STOP, DESCRIPTOR_ID, ITEM_POINTER_SIZE,
    STREAM_CTRL_ID,
};

/// One item queued for transmission.
#[derive(Debug, Clone)]
pub struct SendItem {
    /// Item ID.
    pub id: u64,
    /// Item content. For immediate items this is the big-endian value,
    /// at most the flavour's address width; for addressed items it is
    /// payload data of any length.
    pub data: Bytes,
    /// True if the value travels inside the item pointer.
    pub immediate: bool,
}

/// A heap being assembled for transmission.
///
/// Items and descriptors are accumulated, then serialized once by a
/// [`PacketGenerator`] and discarded.
///
/// ## Example
///
/// ```rust
/// use spead_core::Flavour;
/// use spead_send::SendHeap;
///
/// let mut heap = SendHeap::new(1, Flavour::default());
/// heap.add_item(0x1000, vec![0u8; 64], false).unwrap();
/// let packets: Vec<_> = heap.packets(1472).unwrap().collect();
/// assert_eq!(packets.len(), 1);
/// ```
///
/// [`PacketGenerator`]: crate::PacketGenerator
#[derive(Debug, Clone)]
pub struct SendHeap {
    cnt: i64,
    flavour: Flavour,
    items: Vec<SendItem>,
}

impl SendHeap {
    /// Create an empty heap with the given ID and flavour.
    #[must_use]
    pub fn new(cnt: i64, flavour: Flavour) -> Self {
        Self {
            cnt,
            flavour,
            items: Vec::new(),
        }
    }

    /// Create the heap that ends a stream: a single stream-control item
    /// carrying the end-of-stream value.
    #[must_use]
    pub fn end_of_stream(cnt: i64, flavour: Flavour) -> Self {
        let mut heap = Self::new(cnt, flavour);
        let value = CTRL_STREAM_STOP.to_be_bytes();
        heap.items.push(SendItem {
            id: STREAM_CTRL_ID,
            data: Bytes::copy_from_slice(&value[ITEM_POINTER_SIZE - flavour.heap_address_bytes()..]),
            immediate: true,
        });
        heap
    }

    /// Heap ID.
    #[must_use]
    pub fn cnt(&self) -> i64 {
        self.cnt
    }

    /// The flavour the heap will be serialized with.
    #[must_use]
    pub fn flavour(&self) -> Flavour {
        self.flavour
    }

    /// Queued items, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[SendItem] {
        &self.items
    }

    /// Append an item. Immediate items must fit the flavour's address
    /// width.
    pub fn add_item(
        &mut self,
        id: u64,
        data: impl Into<Bytes>,
        immediate: bool,
    ) -> Result<(), SpeadError> {
        let data = data.into();
        if immediate && data.len() > self.flavour.heap_address_bytes() {
            return Err(SpeadError::InvalidArgument(format!(
                "immediate item {id:#x} is {} bytes but the flavour fits {}",
                data.len(),
                self.flavour.heap_address_bytes()
            )));
        }
        self.items.push(SendItem {
            id,
            data,
            immediate,
        });
        Ok(())
    }

    /// Encode `descriptor` and append it as a descriptor item. The
    /// encoded blob is owned by the heap until serialization completes.
    pub fn add_descriptor(&mut self, descriptor: &Descriptor) -> Result<(), SpeadError> {
        let blob = encode_descriptor(descriptor, self.flavour)?;
        self.items.push(SendItem {
            id: DESCRIPTOR_ID,
            data: blob,
            immediate: false,
        });
        Ok(())
    }

    /// Serialize the heap into an ordered sequence of packets, each at
    /// most `max_packet_size` bytes.
    pub fn packets(&self, max_packet_size: usize) -> Result<crate::PacketGenerator, SpeadError> {
        crate::PacketGenerator::new(self, max_packet_size)
    }
}
