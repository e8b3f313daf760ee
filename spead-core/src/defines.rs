//! Protocol constants and the SPEAD flavour.

use crate::error::SpeadError;

/// One item pointer as a host-endian word.
pub type ItemPointer = u64;

/// Size in bytes of an item pointer on the wire.
pub const ITEM_POINTER_SIZE: usize = 8;

/// Magic value carried in the top 16 bits of every packet header.
pub const MAGIC: u16 = 0x5304;

/// Heap identity (always immediate).
pub const HEAP_CNT_ID: u64 = 0x01;
/// Total payload bytes of the heap (always immediate).
pub const HEAP_LENGTH_ID: u64 = 0x02;
/// Byte offset of this packet's payload within the heap (always immediate).
pub const PAYLOAD_OFFSET_ID: u64 = 0x03;
/// Byte length of this packet's payload (always immediate).
pub const PAYLOAD_LENGTH_ID: u64 = 0x04;
/// An embedded item descriptor (payload is a standalone SPEAD packet).
pub const DESCRIPTOR_ID: u64 = 0x05;
/// Stream control markers, e.g. end-of-stream.
pub const STREAM_CTRL_ID: u64 = 0x06;

/// Name section inside an encoded descriptor.
pub const DESCRIPTOR_NAME_ID: u64 = 0x10;
/// Description section inside an encoded descriptor.
pub const DESCRIPTOR_DESCRIPTION_ID: u64 = 0x11;
/// Shape section inside an encoded descriptor.
pub const DESCRIPTOR_SHAPE_ID: u64 = 0x12;
/// Format section inside an encoded descriptor.
pub const DESCRIPTOR_FORMAT_ID: u64 = 0x13;
/// Described item's ID inside an encoded descriptor.
pub const DESCRIPTOR_ID_ID: u64 = 0x14;
/// Raw numeric-dtype header inside an encoded descriptor.
pub const DESCRIPTOR_DTYPE_ID: u64 = 0x15;

/// `STREAM_CTRL` value signalling end-of-stream.
pub const CTRL_STREAM_STOP: u64 = 0x02;

/// Bitmask of peer protocol bugs to stay interoperable with.
pub type BugCompatMask = u32;

/// Force 4-byte format fields and 8-byte shape fields in encoded
/// descriptors, regardless of the flavour.
pub const BUG_COMPAT_DESCRIPTOR_WIDTHS: BugCompatMask = 1 << 0;

/// Variable-shape dimensions are tagged by bit 1 instead of bit 0.
pub const BUG_COMPAT_SHAPE_BIT_1: BugCompatMask = 1 << 1;

/// The triple of parameters that fixes the wire format for one heap:
/// item-pointer width, heap-address-bits, and bug-compatibility mask.
///
/// Only 64-bit item pointers are supported; `heap_address_bits` may be
/// any positive multiple of 8 strictly below the pointer width. All
/// packets of a heap must share one flavour.
///
/// ## Example
///
/// ```rust
/// use spead_core::Flavour;
///
/// let flavour = Flavour::new(64, 48, 0).unwrap();
/// assert_eq!(flavour.heap_address_bits(), 48);
///
/// // 64 is not strictly below the pointer width
/// assert!(Flavour::new(64, 64, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flavour {
    item_pointer_bits: u32,
    heap_address_bits: u32,
    bug_compat: BugCompatMask,
}

impl Flavour {
    /// Create a flavour, validating the field split.
    pub fn new(
        item_pointer_bits: u32,
        heap_address_bits: u32,
        bug_compat: BugCompatMask,
    ) -> Result<Self, SpeadError> {
        if item_pointer_bits as usize != ITEM_POINTER_SIZE * 8 {
            return Err(SpeadError::InvalidArgument(format!(
                "item pointer width {item_pointer_bits} is not supported"
            )));
        }
        if heap_address_bits == 0
            || heap_address_bits % 8 != 0
            || heap_address_bits >= item_pointer_bits
        {
            return Err(SpeadError::InvalidArgument(format!(
                "heap_address_bits {heap_address_bits} is invalid"
            )));
        }
        Ok(Self {
            item_pointer_bits,
            heap_address_bits,
            bug_compat,
        })
    }

    /// Width of an item pointer in bits.
    #[must_use]
    pub fn item_pointer_bits(&self) -> u32 {
        self.item_pointer_bits
    }

    /// Number of bits used for the address/value field of an item pointer.
    #[must_use]
    pub fn heap_address_bits(&self) -> u32 {
        self.heap_address_bits
    }

    /// Number of bytes used for the address/value field.
    #[must_use]
    pub fn heap_address_bytes(&self) -> usize {
        self.heap_address_bits as usize / 8
    }

    /// Peer bugs to be compatible with.
    #[must_use]
    pub fn bug_compat(&self) -> BugCompatMask {
        self.bug_compat
    }
}

impl Default for Flavour {
    /// 64-bit pointers with 40 heap-address bits and no bug workarounds.
    fn default() -> Self {
        Self {
            item_pointer_bits: 64,
            heap_address_bits: 40,
            bug_compat: 0,
        }
    }
}
