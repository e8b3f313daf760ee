//! # spead-codec
//!
//! Bit-exact wire-format codec for the SPEAD protocol.
//!
//! This crate provides:
//! - [`decode_packet`] / [`encode_packet`] - the shared packet grammar
//! - [`PointerEncoder`] / [`PointerDecoder`] - item-pointer packing under
//!   a flavour's heap-address split
//! - [`encode_descriptor`] / [`decode_descriptor`] - item descriptors as
//!   standalone mini-heaps
//!
//! ## Wire format
//!
//! Everything is big-endian. A packet is:
//!
//! ```text
//! +--------+-------------------+------------------+
//! | Header | N item pointers   | Payload          |
//! | 8 B    | N x 8 B           | payload_length B |
//! +--------+-------------------+------------------+
//! ```
//!
//! The header packs, MSB first: magic `0x5304` (16 bits), the
//! pointer-width tag `8 - heap_address_bits/8` (8 bits), the
//! heap-address byte count (8 bits), and the pointer count (32 bits).

mod descriptor;
mod packet;
mod pointer;

pub use descriptor::{decode_descriptor, encode_descriptor};
pub use packet::{decode_packet, encode_packet, PacketHeader};
pub use pointer::{PointerDecoder, PointerEncoder};
