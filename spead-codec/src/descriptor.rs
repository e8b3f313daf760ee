//! Descriptor encoding and decoding.
//!
//! A descriptor travels as a complete standalone SPEAD packet whose
//! payload concatenates, in order: name, description, format entries,
//! shape entries, and an optional raw dtype header. The entry widths
//! depend on the flavour and on the bug-compatibility mask.

use ntex_bytes::{BufMut, Bytes, BytesMut};

use spead_core::{
    BugCompatMask, CodecError, Descriptor, Flavour, SpeadError, BUG_COMPAT_DESCRIPTOR_WIDTHS,
    BUG_COMPAT_SHAPE_BIT_1, DESCRIPTOR_DESCRIPTION_ID, DESCRIPTOR_DTYPE_ID, DESCRIPTOR_FORMAT_ID,
    DESCRIPTOR_ID_ID, DESCRIPTOR_NAME_ID, DESCRIPTOR_SHAPE_ID, HEAP_CNT_ID, HEAP_LENGTH_ID,
    ITEM_POINTER_SIZE, PAYLOAD_LENGTH_ID, PAYLOAD_OFFSET_ID,
};

use crate::packet::{decode_packet, encode_packet};
use crate::pointer::{PointerDecoder, PointerEncoder};

/// Bytes per format entry under the given flavour parameters.
fn field_size(heap_address_bits: u32, bug_compat: BugCompatMask) -> usize {
    if bug_compat & BUG_COMPAT_DESCRIPTOR_WIDTHS != 0 {
        4
    } else {
        ITEM_POINTER_SIZE + 1 - heap_address_bits as usize / 8
    }
}

/// Bytes per shape entry under the given flavour parameters.
fn shape_size(heap_address_bits: u32, bug_compat: BugCompatMask) -> usize {
    if bug_compat & BUG_COMPAT_DESCRIPTOR_WIDTHS != 0 {
        8
    } else {
        1 + heap_address_bits as usize / 8
    }
}

/// Tag byte marking a variable-length dimension.
fn variable_tag(bug_compat: BugCompatMask) -> u8 {
    if bug_compat & BUG_COMPAT_SHAPE_BIT_1 != 0 {
        2
    } else {
        1
    }
}

/// Slice one payload section, validating its bounds.
fn section_slice(payload: &[u8], offset: u64, end: usize) -> Result<&[u8], CodecError> {
    let start = offset as usize;
    if start > end || end > payload.len() {
        return Err(CodecError::MalformedDescriptor("section out of range"));
    }
    Ok(&payload[start..end])
}

/// Append `value` as a big-endian unsigned number in `len` bytes.
fn put_bytes_be(dst: &mut BytesMut, len: usize, value: u64) -> Result<(), SpeadError> {
    if len < ITEM_POINTER_SIZE && value >> (8 * len) != 0 {
        return Err(SpeadError::InvalidArgument(format!(
            "value {value:#x} does not fit in {len} bytes"
        )));
    }
    dst.put_slice(&value.to_be_bytes()[ITEM_POINTER_SIZE - len..]);
    Ok(())
}

/// Serialize one descriptor as a standalone SPEAD packet.
///
/// Fails with an invalid-argument error if the descriptor's ID lies
/// outside the legal item-ID range for the flavour, or if a format or
/// shape entry does not fit its field width.
pub fn encode_descriptor(descriptor: &Descriptor, flavour: Flavour) -> Result<Bytes, SpeadError> {
    let heap_address_bits = flavour.heap_address_bits();
    let bug_compat = flavour.bug_compat();
    let field_size = field_size(heap_address_bits, bug_compat);
    let shape_size = shape_size(heap_address_bits, bug_compat);
    let encoder = PointerEncoder::new(heap_address_bits);

    let dtype = descriptor.dtype.as_deref().unwrap_or(&[]);
    let have_dtype = !dtype.is_empty();
    let n_items = 9 + usize::from(have_dtype);
    let payload_size = descriptor.name.len()
        + descriptor.description.len()
        + descriptor.format.len() * field_size
        + descriptor.shape.len() * shape_size
        + dtype.len();

    let id_bits = 64 - 1 - heap_address_bits;
    if descriptor.id == 0 || descriptor.id >> id_bits != 0 {
        return Err(SpeadError::InvalidArgument(format!(
            "descriptor ID {:#x} out of range for {id_bits}-bit IDs",
            descriptor.id
        )));
    }

    let mut pointers = Vec::with_capacity(n_items);
    pointers.push(encoder.encode_immediate(HEAP_CNT_ID, 1)?);
    pointers.push(encoder.encode_immediate(HEAP_LENGTH_ID, payload_size as u64)?);
    pointers.push(encoder.encode_immediate(PAYLOAD_OFFSET_ID, 0)?);
    pointers.push(encoder.encode_immediate(PAYLOAD_LENGTH_ID, payload_size as u64)?);
    pointers.push(encoder.encode_immediate(DESCRIPTOR_ID_ID, descriptor.id)?);
    let mut offset = 0u64;
    pointers.push(encoder.encode_address(DESCRIPTOR_NAME_ID, offset)?);
    offset += descriptor.name.len() as u64;
    pointers.push(encoder.encode_address(DESCRIPTOR_DESCRIPTION_ID, offset)?);
    offset += descriptor.description.len() as u64;
    pointers.push(encoder.encode_address(DESCRIPTOR_FORMAT_ID, offset)?);
    offset += (descriptor.format.len() * field_size) as u64;
    pointers.push(encoder.encode_address(DESCRIPTOR_SHAPE_ID, offset)?);
    offset += (descriptor.shape.len() * shape_size) as u64;
    if have_dtype {
        pointers.push(encoder.encode_address(DESCRIPTOR_DTYPE_ID, offset)?);
    }

    let mut payload = BytesMut::with_capacity(payload_size);
    payload.put_slice(descriptor.name.as_bytes());
    payload.put_slice(descriptor.description.as_bytes());
    for &(code, bits) in &descriptor.format {
        payload.put_u8(code);
        put_bytes_be(&mut payload, field_size - 1, bits)?;
    }
    let variable_tag = variable_tag(bug_compat);
    for &dim in &descriptor.shape {
        payload.put_u8(if dim < 0 { variable_tag } else { 0 });
        put_bytes_be(&mut payload, shape_size - 1, if dim < 0 { 0 } else { dim as u64 })?;
    }
    payload.put_slice(dtype);

    let mut out = BytesMut::with_capacity(8 + n_items * ITEM_POINTER_SIZE + payload_size);
    encode_packet(heap_address_bits, &pointers, &payload, &mut out);
    Ok(out.freeze())
}

/// Parse an encoded descriptor blob back into a [`Descriptor`].
///
/// The heap-address split is read from the blob itself; the
/// bug-compatibility mask is not on the wire and must be supplied.
/// Variable-length dimensions decode as -1.
pub fn decode_descriptor(data: &[u8], bug_compat: BugCompatMask) -> Result<Descriptor, CodecError> {
    let (header, _) = decode_packet(data)?;
    let decoder = PointerDecoder::new(header.heap_address_bits);
    let field_size = field_size(header.heap_address_bits, bug_compat);
    let shape_size = shape_size(header.heap_address_bits, bug_compat);

    let mut id = None;
    let mut sections: [Option<u64>; 5] = [None; 5];
    let section_index = |sub_id: u64| match sub_id {
        DESCRIPTOR_NAME_ID => Some(0),
        DESCRIPTOR_DESCRIPTION_ID => Some(1),
        DESCRIPTOR_FORMAT_ID => Some(2),
        DESCRIPTOR_SHAPE_ID => Some(3),
        DESCRIPTOR_DTYPE_ID => Some(4),
        _ => None,
    };
    for pointer in header.item_pointers() {
        if decoder.is_immediate(pointer) {
            if decoder.id(pointer) == DESCRIPTOR_ID_ID {
                id = Some(decoder.value(pointer));
            }
        } else if let Some(index) = section_index(decoder.id(pointer)) {
            sections[index] = Some(decoder.value(pointer));
        }
    }
    let id = id.ok_or(CodecError::MalformedDescriptor("missing item ID"))?;

    // Sections are laid out in declaration order, so each one runs to the
    // next present section's offset (possibly equal, for empty sections)
    // or to the end of the payload.
    let payload = header.payload;
    let end_of = |index: usize| -> usize {
        sections[index + 1..]
            .iter()
            .flatten()
            .next()
            .map_or(payload.len(), |&next| next as usize)
    };

    let name_offset = sections[0].ok_or(CodecError::MalformedDescriptor("missing name"))?;
    let description_offset =
        sections[1].ok_or(CodecError::MalformedDescriptor("missing description"))?;
    let format_offset = sections[2].ok_or(CodecError::MalformedDescriptor("missing format"))?;
    let shape_offset = sections[3].ok_or(CodecError::MalformedDescriptor("missing shape"))?;

    let name = String::from_utf8(section_slice(payload, name_offset, end_of(0))?.to_vec())
        .map_err(|_| CodecError::MalformedDescriptor("name is not UTF-8"))?;
    let description = String::from_utf8(section_slice(payload, description_offset, end_of(1))?.to_vec())
        .map_err(|_| CodecError::MalformedDescriptor("description is not UTF-8"))?;

    let format_bytes = section_slice(payload, format_offset, end_of(2))?;
    if format_bytes.len() % field_size != 0 {
        return Err(CodecError::MalformedDescriptor("format section misaligned"));
    }
    let mut format = Vec::with_capacity(format_bytes.len() / field_size);
    for entry in format_bytes.chunks_exact(field_size) {
        let mut bits = 0u64;
        for &byte in &entry[1..] {
            bits = bits << 8 | u64::from(byte);
        }
        format.push((entry[0], bits));
    }

    let shape_bytes = section_slice(payload, shape_offset, end_of(3))?;
    if shape_bytes.len() % shape_size != 0 {
        return Err(CodecError::MalformedDescriptor("shape section misaligned"));
    }
    let variable_tag = variable_tag(bug_compat);
    let mut shape = Vec::with_capacity(shape_bytes.len() / shape_size);
    for entry in shape_bytes.chunks_exact(shape_size) {
        if entry[0] & variable_tag != 0 {
            shape.push(-1);
        } else {
            let mut dim = 0u64;
            for &byte in &entry[1..] {
                dim = dim << 8 | u64::from(byte);
            }
            shape.push(dim as i64);
        }
    }

    let dtype = match sections[4] {
        Some(offset) => Some(section_slice(payload, offset, payload.len())?.to_vec()),
        None => None,
    };

    Ok(Descriptor {
        id,
        name,
        description,
        format,
        shape,
        dtype,
    })
}
