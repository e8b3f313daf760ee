//! Packet decode and encode.

use ntex_bytes::{BufMut, BytesMut};

use spead_core::{
    CodecError, ItemPointer, HEAP_CNT_ID, HEAP_LENGTH_ID, ITEM_POINTER_SIZE, MAGIC,
    PAYLOAD_LENGTH_ID, PAYLOAD_OFFSET_ID,
};

use crate::pointer::PointerDecoder;

/// Decoded form of one packet header.
///
/// Borrows the pointer block and payload from the input buffer; nothing
/// is copied until a receive heap accepts the packet.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketHeader<'a> {
    /// Heap this packet belongs to.
    pub heap_cnt: i64,
    /// Total heap payload length, or -1 if this packet does not declare it.
    pub heap_length: i64,
    /// Byte offset of this packet's payload within the heap.
    pub payload_offset: i64,
    /// Byte length of this packet's payload.
    pub payload_length: i64,
    /// Heap-address split used by this packet's pointers.
    pub heap_address_bits: u32,
    /// Number of item pointers in the packet, standard ones included.
    pub n_items: usize,
    /// Raw big-endian pointer block.
    pointers: &'a [u8],
    /// This packet's slice of the heap payload.
    pub payload: &'a [u8],
}

impl<'a> PacketHeader<'a> {
    /// Iterate the item pointers that were not consumed into the named
    /// header fields, as host-endian words.
    pub fn item_pointers(&self) -> impl Iterator<Item = ItemPointer> + 'a {
        let decoder = PointerDecoder::new(self.heap_address_bits);
        let pointers: &'a [u8] = self.pointers;
        pointers
            .chunks_exact(ITEM_POINTER_SIZE)
            .filter_map(move |chunk| {
                let pointer = u64::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes"));
                let standard = decoder.is_immediate(pointer)
                    && matches!(
                        decoder.id(pointer),
                        HEAP_CNT_ID | HEAP_LENGTH_ID | PAYLOAD_OFFSET_ID | PAYLOAD_LENGTH_ID
                    );
                (!standard).then_some(pointer)
            })
    }
}

/// Decode one packet from the front of `data`.
///
/// Returns the decoded header and the total number of bytes consumed.
/// On failure nothing is consumed; since packets carry no resync marker,
/// callers must stop scanning the enclosing byte stream.
pub fn decode_packet(data: &[u8]) -> Result<(PacketHeader<'_>, usize), CodecError> {
    if data.len() < 8 {
        return Err(CodecError::Truncated { size: data.len() });
    }
    let word = u64::from_be_bytes(data[..8].try_into().expect("slice is 8 bytes"));
    let magic = (word >> 48) as u16;
    if magic != MAGIC {
        return Err(CodecError::BadMagic { found: magic });
    }
    let pointer_tag = ((word >> 40) & 0xff) as u8;
    let heap_address_bytes = ((word >> 32) & 0xff) as u8;
    if heap_address_bytes == 0
        || (heap_address_bytes as usize) >= ITEM_POINTER_SIZE
        || pointer_tag as usize + heap_address_bytes as usize != ITEM_POINTER_SIZE
    {
        return Err(CodecError::BadWidths {
            pointer_tag,
            heap_address_bytes,
        });
    }
    let n_items = (word & 0xffff_ffff) as usize;
    let pointers_end = 8 + n_items * ITEM_POINTER_SIZE;
    if pointers_end > data.len() {
        return Err(CodecError::PointerOverrun {
            n_items,
            size: data.len(),
        });
    }

    let heap_address_bits = u32::from(heap_address_bytes) * 8;
    let decoder = PointerDecoder::new(heap_address_bits);
    let mut heap_cnt = None;
    let mut heap_length = -1;
    let mut payload_offset = None;
    let mut payload_length = None;
    for chunk in data[8..pointers_end].chunks_exact(ITEM_POINTER_SIZE) {
        let pointer = u64::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes"));
        if !decoder.is_immediate(pointer) {
            continue;
        }
        // Values occupy at most 56 bits, so the i64 casts cannot wrap
        let value = decoder.value(pointer) as i64;
        match decoder.id(pointer) {
            HEAP_CNT_ID => heap_cnt = Some(value),
            HEAP_LENGTH_ID => heap_length = value,
            PAYLOAD_OFFSET_ID => payload_offset = Some(value),
            PAYLOAD_LENGTH_ID => payload_length = Some(value),
            _ => {}
        }
    }
    let heap_cnt = heap_cnt.ok_or(CodecError::MissingPointer("HEAP_CNT"))?;
    let payload_offset = payload_offset.ok_or(CodecError::MissingPointer("PAYLOAD_OFFSET"))?;
    let payload_length = payload_length.ok_or(CodecError::MissingPointer("PAYLOAD_LENGTH"))?;

    let available = data.len() - pointers_end;
    if payload_length as usize > available {
        return Err(CodecError::PayloadOverrun {
            payload_length,
            available,
        });
    }
    let consumed = pointers_end + payload_length as usize;

    Ok((
        PacketHeader {
            heap_cnt,
            heap_length,
            payload_offset,
            payload_length,
            heap_address_bits,
            n_items,
            pointers: &data[8..pointers_end],
            payload: &data[pointers_end..consumed],
        },
        consumed,
    ))
}

/// Encode one packet: header word, the given host-endian pointers, then
/// the payload.
pub fn encode_packet(
    heap_address_bits: u32,
    pointers: &[ItemPointer],
    payload: &[u8],
    dst: &mut BytesMut,
) {
    let heap_address_bytes = heap_address_bits as u64 / 8;
    dst.reserve(8 + pointers.len() * ITEM_POINTER_SIZE + payload.len());
    dst.put_u64(
        u64::from(MAGIC) << 48
            | (ITEM_POINTER_SIZE as u64 - heap_address_bytes) << 40
            | heap_address_bytes << 32
            | pointers.len() as u64,
    );
    for &pointer in pointers {
        dst.put_u64(pointer);
    }
    dst.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::PointerEncoder;

    fn sample_packet(heap_address_bits: u32) -> BytesMut {
        let encoder = PointerEncoder::new(heap_address_bits);
        let pointers = [
            encoder.encode_immediate(HEAP_CNT_ID, 7).unwrap(),
            encoder.encode_immediate(HEAP_LENGTH_ID, 8).unwrap(),
            encoder.encode_immediate(PAYLOAD_OFFSET_ID, 0).unwrap(),
            encoder.encode_immediate(PAYLOAD_LENGTH_ID, 8).unwrap(),
            encoder.encode_address(0x1000, 0).unwrap(),
        ];
        let mut out = BytesMut::new();
        encode_packet(heap_address_bits, &pointers, b"ABCDEFGH", &mut out);
        out
    }

    #[test]
    fn test_roundtrip() {
        let data = sample_packet(40);
        let (header, consumed) = decode_packet(&data).unwrap();

        assert_eq!(consumed, data.len());
        assert_eq!(header.heap_cnt, 7);
        assert_eq!(header.heap_length, 8);
        assert_eq!(header.payload_offset, 0);
        assert_eq!(header.payload_length, 8);
        assert_eq!(header.heap_address_bits, 40);
        assert_eq!(header.n_items, 5);
        assert_eq!(header.payload, b"ABCDEFGH");

        // Only the non-standard pointer is reported
        let extras: Vec<_> = header.item_pointers().collect();
        assert_eq!(extras.len(), 1);
        let decoder = PointerDecoder::new(40);
        assert_eq!(decoder.id(extras[0]), 0x1000);
    }

    #[test]
    fn test_heap_length_optional() {
        let encoder = PointerEncoder::new(40);
        let pointers = [
            encoder.encode_immediate(HEAP_CNT_ID, 3).unwrap(),
            encoder.encode_immediate(PAYLOAD_OFFSET_ID, 0).unwrap(),
            encoder.encode_immediate(PAYLOAD_LENGTH_ID, 0).unwrap(),
        ];
        let mut data = BytesMut::new();
        encode_packet(40, &pointers, b"", &mut data);

        let (header, _) = decode_packet(&data).unwrap();
        assert_eq!(header.heap_length, -1);
    }

    #[test]
    fn test_truncated_header() {
        assert_eq!(
            decode_packet(&[0x53, 0x04]),
            Err(CodecError::Truncated { size: 2 })
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut data = sample_packet(40);
        data[0] = 0x54;
        assert!(matches!(
            decode_packet(&data),
            Err(CodecError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_inconsistent_widths() {
        let mut data = sample_packet(40);
        // Pointer tag no longer complements the address byte count
        data[2] = 4;
        assert!(matches!(
            decode_packet(&data),
            Err(CodecError::BadWidths { .. })
        ));
    }

    #[test]
    fn test_pointer_overrun() {
        let data = sample_packet(40);
        assert!(matches!(
            decode_packet(&data[..24]),
            Err(CodecError::PointerOverrun { .. })
        ));
    }

    #[test]
    fn test_payload_overrun() {
        let data = sample_packet(40);
        // Chop two payload bytes off the end
        assert!(matches!(
            decode_packet(&data[..data.len() - 2]),
            Err(CodecError::PayloadOverrun { .. })
        ));
    }

    #[test]
    fn test_missing_heap_cnt() {
        let encoder = PointerEncoder::new(40);
        let pointers = [
            encoder.encode_immediate(PAYLOAD_OFFSET_ID, 0).unwrap(),
            encoder.encode_immediate(PAYLOAD_LENGTH_ID, 0).unwrap(),
        ];
        let mut data = BytesMut::new();
        encode_packet(40, &pointers, b"", &mut data);
        assert_eq!(
            decode_packet(&data),
            Err(CodecError::MissingPointer("HEAP_CNT"))
        );
    }

    #[test]
    fn test_consumed_stops_before_next_packet() {
        let mut data = sample_packet(40);
        let first_len = data.len();
        let second = sample_packet(40);
        data.extend_from_slice(&second);

        let (_, consumed) = decode_packet(&data).unwrap();
        assert_eq!(consumed, first_len);
        let (header, _) = decode_packet(&data[consumed..]).unwrap();
        assert_eq!(header.heap_cnt, 7);
    }
}
