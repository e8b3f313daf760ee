//! Packet builders shared by the unit tests.

use ntex_bytes::BytesMut;

use spead_codec::{encode_packet, PointerEncoder};
use spead_core::{
    CTRL_STREAM_STOP, HEAP_CNT_ID, HEAP_LENGTH_ID, PAYLOAD_LENGTH_ID, PAYLOAD_OFFSET_ID,
    STREAM_CTRL_ID,
};

pub const BITS: u32 = 40;

/// Encode a data packet with the four standard pointers.
pub fn data_packet(heap_cnt: u64, heap_length: u64, offset: u64, payload: &[u8]) -> BytesMut {
    let encoder = PointerEncoder::new(BITS);
    let pointers = [
        encoder.encode_immediate(HEAP_CNT_ID, heap_cnt).unwrap(),
        encoder
            .encode_immediate(HEAP_LENGTH_ID, heap_length)
            .unwrap(),
        encoder.encode_immediate(PAYLOAD_OFFSET_ID, offset).unwrap(),
        encoder
            .encode_immediate(PAYLOAD_LENGTH_ID, payload.len() as u64)
            .unwrap(),
    ];
    let mut out = BytesMut::new();
    encode_packet(BITS, &pointers, payload, &mut out);
    out
}

/// Encode a data packet that does not declare the total heap length.
pub fn data_packet_no_length(heap_cnt: u64, offset: u64, payload: &[u8]) -> BytesMut {
    let encoder = PointerEncoder::new(BITS);
    let pointers = [
        encoder.encode_immediate(HEAP_CNT_ID, heap_cnt).unwrap(),
        encoder.encode_immediate(PAYLOAD_OFFSET_ID, offset).unwrap(),
        encoder
            .encode_immediate(PAYLOAD_LENGTH_ID, payload.len() as u64)
            .unwrap(),
    ];
    let mut out = BytesMut::new();
    encode_packet(BITS, &pointers, payload, &mut out);
    out
}

/// Encode a zero-payload packet carrying an end-of-stream control item.
pub fn end_packet(heap_cnt: u64) -> BytesMut {
    let encoder = PointerEncoder::new(BITS);
    let pointers = [
        encoder.encode_immediate(HEAP_CNT_ID, heap_cnt).unwrap(),
        encoder.encode_immediate(HEAP_LENGTH_ID, 0).unwrap(),
        encoder.encode_immediate(PAYLOAD_OFFSET_ID, 0).unwrap(),
        encoder.encode_immediate(PAYLOAD_LENGTH_ID, 0).unwrap(),
        encoder
            .encode_immediate(STREAM_CTRL_ID, CTRL_STREAM_STOP)
            .unwrap(),
    ];
    let mut out = BytesMut::new();
    encode_packet(BITS, &pointers, b"", &mut out);
    out
}
