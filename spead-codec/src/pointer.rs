//! Item-pointer packing and unpacking.
//!
//! An item pointer is one 64-bit word: an immediate flag in the top bit,
//! then the item ID, then `heap_address_bits` of value. When the flag is
//! set the value is the item's literal content; otherwise it is a byte
//! offset into the heap payload.

use spead_core::{ItemPointer, SpeadError};

/// Packs item pointers for a given heap-address split.
#[derive(Debug, Clone, Copy)]
pub struct PointerEncoder {
    heap_address_bits: u32,
}

impl PointerEncoder {
    /// Create an encoder. `heap_address_bits` must come from a validated
    /// flavour or a decoded packet header.
    #[must_use]
    pub fn new(heap_address_bits: u32) -> Self {
        debug_assert!(
            heap_address_bits > 0 && heap_address_bits < 64 && heap_address_bits % 8 == 0
        );
        Self { heap_address_bits }
    }

    fn check_id(&self, id: u64) -> Result<(), SpeadError> {
        let id_bits = 64 - 1 - self.heap_address_bits;
        if id == 0 || id >> id_bits != 0 {
            return Err(SpeadError::InvalidArgument(format!(
                "item ID {id:#x} out of range for {id_bits}-bit IDs"
            )));
        }
        Ok(())
    }

    /// Pack an immediate pointer carrying `value` as literal content.
    pub fn encode_immediate(&self, id: u64, value: u64) -> Result<ItemPointer, SpeadError> {
        self.check_id(id)?;
        if value >> self.heap_address_bits != 0 {
            return Err(SpeadError::InvalidArgument(format!(
                "immediate value {value:#x} does not fit in {} bits",
                self.heap_address_bits
            )));
        }
        Ok(1 << 63 | id << self.heap_address_bits | value)
    }

    /// Pack an address pointer carrying a payload byte offset.
    pub fn encode_address(&self, id: u64, address: u64) -> Result<ItemPointer, SpeadError> {
        self.check_id(id)?;
        if address >> self.heap_address_bits != 0 {
            return Err(SpeadError::InvalidArgument(format!(
                "payload address {address:#x} does not fit in {} bits",
                self.heap_address_bits
            )));
        }
        Ok(id << self.heap_address_bits | address)
    }
}

/// Unpacks item pointers for a given heap-address split.
#[derive(Debug, Clone, Copy)]
pub struct PointerDecoder {
    heap_address_bits: u32,
}

impl PointerDecoder {
    /// Create a decoder for the given heap-address split.
    #[must_use]
    pub fn new(heap_address_bits: u32) -> Self {
        debug_assert!(
            heap_address_bits > 0 && heap_address_bits < 64 && heap_address_bits % 8 == 0
        );
        Self { heap_address_bits }
    }

    /// True if the pointer carries its value inline.
    #[must_use]
    pub fn is_immediate(&self, pointer: ItemPointer) -> bool {
        pointer >> 63 != 0
    }

    /// Extract the item ID.
    #[must_use]
    pub fn id(&self, pointer: ItemPointer) -> u64 {
        // Shift the immediate flag out of the top, then the value field
        // out of the bottom.
        (pointer << 1) >> (1 + self.heap_address_bits)
    }

    /// Extract the value field (immediate content or payload offset).
    #[must_use]
    pub fn value(&self, pointer: ItemPointer) -> u64 {
        pointer & ((1 << self.heap_address_bits) - 1)
    }
}
