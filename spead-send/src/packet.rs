//! Splitting a send heap into wire packets.

use ntex_bytes::{BufMut, Bytes, BytesMut};

use spead_codec::{encode_packet, PointerEncoder};
use spead_core::{
    ItemPointer, SpeadError, HEAP_CNT_ID, HEAP_LENGTH_ID, ITEM_POINTER_SIZE, PAYLOAD_LENGTH_ID,
    PAYLOAD_OFFSET_ID,
};

use crate::heap::SendHeap;

/// Default packet size cap, sized for a 1500-byte MTU.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1472;

/// Iterator producing the wire packets of one [`SendHeap`].
///
/// Every packet carries the heap ID, the total heap length, and its own
/// payload offset and length as immediate pointers. All item pointers
/// travel in the first packet; payload fills the remaining space of each
/// packet in item order.
pub struct PacketGenerator {
    heap_address_bits: u32,
    max_packet_size: usize,
    heap_cnt_pointer: ItemPointer,
    heap_length_pointer: ItemPointer,
    item_pointers: Vec<ItemPointer>,
    chunks: Vec<Bytes>,
    payload_size: u64,
    payload_offset: u64,
    chunk_index: usize,
    chunk_offset: usize,
    emitted_any: bool,
}

impl PacketGenerator {
    /// Plan the packetization of `heap`. Fails with an invalid-argument
    /// error if the heap ID is negative, an item does not fit the
    /// flavour, or `max_packet_size` cannot fit the header, the standard
    /// pointers, every item pointer, and one byte of payload.
    pub fn new(heap: &SendHeap, max_packet_size: usize) -> Result<Self, SpeadError> {
        let flavour = heap.flavour();
        let heap_address_bits = flavour.heap_address_bits();
        let encoder = PointerEncoder::new(heap_address_bits);

        let cnt = u64::try_from(heap.cnt()).map_err(|_| {
            SpeadError::InvalidArgument(format!("heap ID {} must be non-negative", heap.cnt()))
        })?;
        let heap_cnt_pointer = encoder.encode_immediate(HEAP_CNT_ID, cnt)?;

        let mut item_pointers = Vec::with_capacity(heap.items().len());
        let mut chunks = Vec::new();
        let mut payload_size = 0u64;
        for item in heap.items() {
            if item.immediate {
                let value = item
                    .data
                    .iter()
                    .fold(0u64, |value, &byte| value << 8 | u64::from(byte));
                item_pointers.push(encoder.encode_immediate(item.id, value)?);
            } else {
                item_pointers.push(encoder.encode_address(item.id, payload_size)?);
                payload_size += item.data.len() as u64;
                chunks.push(item.data.clone());
            }
        }
        let heap_length_pointer = encoder.encode_immediate(HEAP_LENGTH_ID, payload_size)?;

        let first_packet_overhead =
            8 + (4 + item_pointers.len()) * ITEM_POINTER_SIZE + usize::from(payload_size > 0);
        if max_packet_size < first_packet_overhead {
            return Err(SpeadError::InvalidArgument(format!(
                "max_packet_size {max_packet_size} cannot fit {} item pointers",
                item_pointers.len()
            )));
        }

        Ok(Self {
            heap_address_bits,
            max_packet_size,
            heap_cnt_pointer,
            heap_length_pointer,
            item_pointers,
            chunks,
            payload_size,
            payload_offset: 0,
            chunk_index: 0,
            chunk_offset: 0,
            emitted_any: false,
        })
    }

    /// Gather the next `length` payload bytes across item chunks.
    fn append_payload(&mut self, dst: &mut BytesMut, length: usize) {
        let mut remaining = length;
        while remaining > 0 {
            let chunk = &self.chunks[self.chunk_index];
            if self.chunk_offset == chunk.len() {
                self.chunk_index += 1;
                self.chunk_offset = 0;
                continue;
            }
            let take = remaining.min(chunk.len() - self.chunk_offset);
            dst.put_slice(&chunk[self.chunk_offset..self.chunk_offset + take]);
            self.chunk_offset += take;
            remaining -= take;
        }
    }
}

impl Iterator for PacketGenerator {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.emitted_any && self.payload_offset == self.payload_size {
            return None;
        }
        let encoder = PointerEncoder::new(self.heap_address_bits);
        // Item pointers all travel in the first packet
        let extra = if self.emitted_any {
            &[]
        } else {
            self.item_pointers.as_slice()
        };
        let overhead = 8 + (4 + extra.len()) * ITEM_POINTER_SIZE;
        let payload_length =
            (self.payload_size - self.payload_offset).min((self.max_packet_size - overhead) as u64);

        let mut pointers = Vec::with_capacity(4 + extra.len());
        pointers.push(self.heap_cnt_pointer);
        pointers.push(self.heap_length_pointer);
        pointers.push(
            encoder
                .encode_immediate(PAYLOAD_OFFSET_ID, self.payload_offset)
                .expect("offset below payload size, validated at construction"),
        );
        pointers.push(
            encoder
                .encode_immediate(PAYLOAD_LENGTH_ID, payload_length)
                .expect("length below payload size, validated at construction"),
        );
        pointers.extend_from_slice(extra);

        let mut out = BytesMut::with_capacity(overhead + payload_length as usize);
        encode_packet(self.heap_address_bits, &pointers, &[], &mut out);
        self.append_payload(&mut out, payload_length as usize);
        self.payload_offset += payload_length;
        self.emitted_any = true;
        Some(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use spead_codec::{decode_packet, PointerDecoder};
    use spead_core::{Flavour, STREAM_CTRL_ID};

    fn flavour() -> Flavour {
        Flavour::default()
    }

    #[test]
    fn test_single_packet_heap() {
        let mut heap = SendHeap::new(5, flavour());
        heap.add_item(0x1000, vec![7u8; 32], false).unwrap();
        let packets: Vec<_> = heap.packets(DEFAULT_MAX_PACKET_SIZE).unwrap().collect();
        assert_eq!(packets.len(), 1);

        let (header, consumed) = decode_packet(&packets[0]).unwrap();
        assert_eq!(consumed, packets[0].len());
        assert_eq!(header.heap_cnt, 5);
        assert_eq!(header.heap_length, 32);
        assert_eq!(header.payload_offset, 0);
        assert_eq!(header.payload_length, 32);
        assert_eq!(header.payload, &[7u8; 32][..]);
    }

    #[test]
    fn test_split_across_packets() {
        let mut heap = SendHeap::new(1, flavour());
        let data: Vec<u8> = (0..=255).collect();
        heap.add_item(0x1000, data.clone(), false).unwrap();
        // Header (8) + four standard pointers (32) + one item pointer (8)
        // leaves 80 bytes of payload in the first packet, 88 afterwards
        let packets: Vec<_> = heap.packets(128).unwrap().collect();
        assert_eq!(packets.len(), 3);

        let mut reassembled = Vec::new();
        let mut expected_offset = 0;
        for packet in &packets {
            let (header, _) = decode_packet(packet).unwrap();
            assert!(packet.len() <= 128);
            assert_eq!(header.heap_cnt, 1);
            assert_eq!(header.heap_length, 256);
            assert_eq!(header.payload_offset, expected_offset);
            expected_offset += header.payload_length;
            reassembled.extend_from_slice(header.payload);
        }
        assert_eq!(reassembled, data);

        // Item pointers only in the first packet
        assert_eq!(decode_packet(&packets[0]).unwrap().0.n_items, 5);
        assert_eq!(decode_packet(&packets[1]).unwrap().0.n_items, 4);
    }

    #[test]
    fn test_payload_concatenates_items_in_order() {
        let mut heap = SendHeap::new(1, flavour());
        heap.add_item(0x1000, &b"abcd"[..], false).unwrap();
        heap.add_item(0x1001, &b"efgh"[..], false).unwrap();
        let packets: Vec<_> = heap.packets(DEFAULT_MAX_PACKET_SIZE).unwrap().collect();
        assert_eq!(packets.len(), 1);

        let (header, _) = decode_packet(&packets[0]).unwrap();
        assert_eq!(header.payload, b"abcdefgh");
        let decoder = PointerDecoder::new(header.heap_address_bits);
        let addresses: Vec<u64> = header
            .item_pointers()
            .map(|pointer| decoder.value(pointer))
            .collect();
        assert_eq!(addresses, vec![0, 4]);
    }

    #[test]
    fn test_immediate_item_in_pointer() {
        let mut heap = SendHeap::new(1, flavour());
        heap.add_item(0x1600, vec![0u8, 0, 0, 1, 2], true).unwrap();
        let packets: Vec<_> = heap.packets(DEFAULT_MAX_PACKET_SIZE).unwrap().collect();
        assert_eq!(packets.len(), 1);

        let (header, _) = decode_packet(&packets[0]).unwrap();
        assert_eq!(header.payload_length, 0);
        let decoder = PointerDecoder::new(header.heap_address_bits);
        let pointer = header.item_pointers().next().unwrap();
        assert!(decoder.is_immediate(pointer));
        assert_eq!(decoder.id(pointer), 0x1600);
        assert_eq!(decoder.value(pointer), 0x0102);
    }

    #[test]
    fn test_end_of_stream_heap() {
        let heap = SendHeap::end_of_stream(3, flavour());
        let packets: Vec<_> = heap.packets(DEFAULT_MAX_PACKET_SIZE).unwrap().collect();
        assert_eq!(packets.len(), 1);

        let (header, _) = decode_packet(&packets[0]).unwrap();
        assert_eq!(header.heap_cnt, 3);
        assert_eq!(header.heap_length, 0);
        let decoder = PointerDecoder::new(header.heap_address_bits);
        let pointer = header.item_pointers().next().unwrap();
        assert_eq!(decoder.id(pointer), STREAM_CTRL_ID);
        assert_eq!(decoder.value(pointer), 2);
    }

    #[test]
    fn test_max_packet_size_too_small() {
        let mut heap = SendHeap::new(1, flavour());
        heap.add_item(0x1000, vec![0u8; 16], false).unwrap();
        assert!(heap.packets(48).is_err());
        assert!(heap.packets(49).is_ok());
    }

    #[test]
    fn test_negative_heap_cnt_rejected() {
        let heap = SendHeap::new(-1, flavour());
        assert!(heap.packets(DEFAULT_MAX_PACKET_SIZE).is_err());
    }
}
