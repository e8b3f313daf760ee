//! Payload memory management.
//!
//! Heap payloads start out uninitialized and are filled piecewise as
//! packets arrive, so the buffer primitive here deliberately avoids the
//! zero-fill that `vec![0; n]` would perform. Readers must only touch
//! offsets that were previously written; the receive side enforces that
//! by tracking packet coverage before exposing any bytes.

use std::mem::MaybeUninit;
use std::sync::Arc;

use parking_lot::Mutex;

/// An owned byte buffer whose contents start uninitialized.
///
/// Chunks are produced by a [`MemoryAllocator`]. A chunk allocated from a
/// [`MemoryPool`] returns to the pool's free list when dropped.
pub struct MemoryChunk {
    data: Option<Box<[MaybeUninit<u8>]>>,
    pool: Option<Arc<MemoryPoolInner>>,
}

impl MemoryChunk {
    /// Allocate a standalone chunk (not tied to a pool).
    #[must_use]
    pub fn uninit(size: usize) -> Self {
        Self {
            data: Some(Box::new_uninit_slice(size)),
            pool: None,
        }
    }

    fn data(&self) -> &[MaybeUninit<u8>] {
        self.data.as_ref().expect("chunk already released")
    }

    fn data_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        self.data.as_mut().expect("chunk already released")
    }

    /// Capacity of the chunk in bytes. May exceed the requested size when
    /// the chunk came from a pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// True if the chunk has zero capacity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Copy `src` into the chunk starting at `offset`, initializing that
    /// range.
    ///
    /// # Panics
    ///
    /// Panics if `offset + src.len()` exceeds the chunk capacity.
    pub fn write(&mut self, offset: usize, src: &[u8]) {
        let dst = &mut self.data_mut()[offset..offset + src.len()];
        // MaybeUninit<u8> has the same layout as u8
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_mut_ptr().cast::<u8>(), src.len());
        }
    }

    /// Copy the full contents of `other` (initialized or not) into the
    /// front of this chunk. Used when growing a payload buffer: written
    /// regions carry over, unwritten regions stay unwritten.
    ///
    /// # Panics
    ///
    /// Panics if `other` is larger than this chunk.
    pub fn copy_from(&mut self, other: &MemoryChunk) {
        let src = other.data();
        self.data_mut()[..src.len()].copy_from_slice(src);
    }

    /// View the first `len` bytes as initialized.
    ///
    /// # Safety
    ///
    /// Every byte in `[0, len)` must have been written via
    /// [`MemoryChunk::write`] (directly or carried over by
    /// [`MemoryChunk::copy_from`]).
    #[must_use]
    pub unsafe fn assume_init(&self, len: usize) -> &[u8] {
        let data = &self.data()[..len];
        std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), data.len())
    }
}

impl std::fmt::Debug for MemoryChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChunk")
            .field("len", &self.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

impl Drop for MemoryChunk {
    fn drop(&mut self) {
        if let (Some(pool), Some(data)) = (self.pool.take(), self.data.take()) {
            pool.release(data);
        }
    }
}

/// Source of payload buffers for receive heaps.
///
/// The single operation returns an owned, uninitialized buffer of at
/// least the requested size. Implementations must be callable from any
/// stream's execution context.
pub trait MemoryAllocator: Send + Sync {
    /// Allocate a chunk of at least `size` bytes.
    fn allocate(&self, size: usize) -> MemoryChunk;
}

/// Allocator that hands out fresh chunks and lets them drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAllocator;

impl MemoryAllocator for DefaultAllocator {
    fn allocate(&self, size: usize) -> MemoryChunk {
        MemoryChunk::uninit(size)
    }
}

struct MemoryPoolInner {
    free: Mutex<Vec<Box<[MaybeUninit<u8>]>>>,
    chunk_size: usize,
    capacity: usize,
}

impl MemoryPoolInner {
    fn release(&self, data: Box<[MaybeUninit<u8>]>) {
        // Only uniform chunks go back on the free list
        if data.len() == self.chunk_size {
            let mut free = self.free.lock();
            if free.len() < self.capacity {
                free.push(data);
            }
        }
    }
}

/// Pool of reusable payload chunks.
///
/// Requests up to the configured chunk size are served from a free list
/// (or by allocating a full-size chunk); larger requests fall through to
/// a one-off allocation that is not retained.
///
/// ## Example
///
/// ```rust
/// use spead_core::{MemoryAllocator, MemoryPool};
///
/// let pool = MemoryPool::new(4096, 8);
///
/// let chunk = pool.allocate(1500);
/// assert!(chunk.len() >= 1500);
///
/// // Chunk returns to the pool when dropped
/// drop(chunk);
/// assert_eq!(pool.available(), 1);
/// ```
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<MemoryPoolInner>,
}

impl MemoryPool {
    /// Create a pool of `capacity` chunks of `chunk_size` bytes each.
    #[must_use]
    pub fn new(chunk_size: usize, capacity: usize) -> Self {
        Self {
            inner: Arc::new(MemoryPoolInner {
                free: Mutex::new(Vec::with_capacity(capacity)),
                chunk_size,
                capacity,
            }),
        }
    }

    /// Pre-allocate up to `count` chunks into the free list.
    pub fn preallocate(&self, count: usize) {
        let mut free = self.inner.free.lock();
        let to_add = count.min(self.inner.capacity.saturating_sub(free.len()));
        for _ in 0..to_add {
            free.push(Box::new_uninit_slice(self.inner.chunk_size));
        }
    }

    /// Number of chunks currently on the free list.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl MemoryAllocator for MemoryPool {
    fn allocate(&self, size: usize) -> MemoryChunk {
        if size <= self.inner.chunk_size {
            let data = self
                .inner
                .free
                .lock()
                .pop()
                .unwrap_or_else(|| Box::new_uninit_slice(self.inner.chunk_size));
            MemoryChunk {
                data: Some(data),
                pool: Some(self.inner.clone()),
            }
        } else {
            MemoryChunk::uninit(size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let mut chunk = MemoryChunk::uninit(16);
        chunk.write(4, b"spead");
        chunk.write(0, b"\x01\x02\x03\x04");
        // All of [0, 9) has been written
        let view = unsafe { chunk.assume_init(9) };
        assert_eq!(view, b"\x01\x02\x03\x04spead");
    }

    #[test]
    fn test_copy_from_preserves_written_prefix() {
        let mut small = MemoryChunk::uninit(8);
        small.write(0, b"abcdefgh");
        let mut big = MemoryChunk::uninit(32);
        big.copy_from(&small);
        assert_eq!(unsafe { big.assume_init(8) }, b"abcdefgh");
    }

    #[test]
    fn test_pool_acquire_release() {
        let pool = MemoryPool::new(1024, 4);
        assert_eq!(pool.available(), 0);

        {
            let mut chunk = pool.allocate(100);
            assert_eq!(chunk.len(), 1024);
            chunk.write(0, b"x");
            assert_eq!(pool.available(), 0);
        }

        // Chunk returned on drop
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_pool_capacity_limit() {
        let pool = MemoryPool::new(64, 2);
        let chunks: Vec<_> = (0..3).map(|_| pool.allocate(64)).collect();
        drop(chunks);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_pool_oversized_request_not_retained() {
        let pool = MemoryPool::new(64, 4);
        let big = pool.allocate(1000);
        assert_eq!(big.len(), 1000);
        drop(big);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_preallocate() {
        let pool = MemoryPool::new(256, 8);
        pool.preallocate(5);
        assert_eq!(pool.available(), 5);
        pool.preallocate(100);
        assert_eq!(pool.available(), 8);
    }
}
