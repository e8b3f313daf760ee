//! Error types for the SPEAD protocol engine.

/// Top-level error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpeadError {
    /// Wire-format decode or encode failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Programmer error: a value outside its legal range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The stream has been stopped and accepts no further work.
    #[error("stream stopped")]
    Stopped,
}

/// Wire-format failures.
///
/// Decode failures are expected under normal operation on a lossy
/// transport; callers skip the offending input rather than abort.
/// Encode failures signal programmer error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input shorter than a packet header.
    #[error("packet too small: {size} bytes")]
    Truncated {
        /// Bytes available.
        size: usize,
    },

    /// Header magic did not match.
    #[error("bad magic: 0x{found:04x}")]
    BadMagic {
        /// Value found in the top 16 bits.
        found: u16,
    },

    /// The pointer-width tag and heap-address byte count are inconsistent.
    #[error("unsupported field widths: pointer tag {pointer_tag}, heap address bytes {heap_address_bytes}")]
    BadWidths {
        /// Encoded pointer-width tag.
        pointer_tag: u8,
        /// Encoded heap-address byte count.
        heap_address_bytes: u8,
    },

    /// The declared item pointers do not fit in the input.
    #[error("item pointers overrun the packet: {n_items} pointers, {size} bytes")]
    PointerOverrun {
        /// Declared pointer count.
        n_items: usize,
        /// Bytes available.
        size: usize,
    },

    /// The declared payload does not fit in the input.
    #[error("payload overruns the packet: {payload_length} bytes declared, {available} available")]
    PayloadOverrun {
        /// Declared payload length.
        payload_length: i64,
        /// Bytes available after the pointers.
        available: usize,
    },

    /// A required immediate item pointer was absent.
    #[error("required item pointer missing: {0}")]
    MissingPointer(&'static str),

    /// An encoded descriptor could not be parsed.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(&'static str),
}

/// Conditions reported by ring buffer pop operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// The ring buffer has been stopped and drained.
    #[error("ring buffer stopped")]
    Stopped,

    /// No item is currently queued.
    #[error("ring buffer empty")]
    Empty,
}

/// Error returned by ring buffer push operations, handing the rejected
/// value back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RingPushError<T> {
    /// The ring buffer has been stopped.
    #[error("ring buffer stopped")]
    Stopped(T),

    /// The ring buffer is at capacity.
    #[error("ring buffer full")]
    Full(T),
}

impl<T> RingPushError<T> {
    /// Recover the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            Self::Stopped(value) | Self::Full(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpeadError::from(CodecError::BadMagic { found: 0x1234 });
        assert_eq!(err.to_string(), "codec error: bad magic: 0x1234");
    }

    #[test]
    fn test_push_error_into_inner() {
        let err = RingPushError::Full(42);
        assert_eq!(err.into_inner(), 42);
    }
}
