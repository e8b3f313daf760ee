//! Packet sources attached to a stream.

use ntex_bytes::Bytes;

use crate::strand::StreamInner;
use crate::stream::mem_to_stream;

/// Contract for objects that feed packets into a stream.
///
/// A reader is started once and owned by its stream. Both calls run on
/// the stream's strand, so a reader may mutate stream state directly in
/// `start` and may keep a clone of the strand (via
/// [`StreamInner::strand`]) to post packets produced asynchronously
/// later. At shutdown readers are stopped in reverse insertion order,
/// before the stream's own state is torn down.
pub trait Reader: Send + 'static {
    /// Begin producing packets. Called once, on the stream's strand.
    fn start(&mut self, inner: &mut StreamInner);

    /// Cancel any outstanding work. Called on the strand; must be prompt
    /// and idempotent.
    fn stop(&mut self);
}

/// Reader that feeds a block of in-memory packets through the stream.
///
/// The whole block is processed during `start`; there is no outstanding
/// work to cancel. The stream is not stopped when the block is
/// exhausted, so a stream fed only by buffers either stops on an
/// end-of-stream control packet or via an explicit stop.
pub struct BufferReader {
    data: Bytes,
}

impl BufferReader {
    /// Create a reader over a block of encoded packets.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl Reader for BufferReader {
    fn start(&mut self, inner: &mut StreamInner) {
        let consumed = mem_to_stream(inner.base_mut(), &self.data);
        tracing::trace!(consumed, total = self.data.len(), "buffer reader drained");
    }

    fn stop(&mut self) {}
}
