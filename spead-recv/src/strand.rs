//! Strand-serialized streams on a shared worker pool.
//!
//! Every mutation of a stream's state - reader callbacks, user-triggered
//! stop, heap delivery - goes through the stream's [`Strand`]: a FIFO
//! task queue drained by a single task on the worker pool, so no two
//! tasks for one stream ever run concurrently, while different streams
//! run in parallel.

use std::sync::mpsc;
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use spead_core::{MemoryAllocator, ThreadPool};

use crate::reader::Reader;
use crate::stream::{HeapSink, StreamBase, StreamConfig};

type StrandTask = Box<dyn FnOnce(&mut StreamInner) + Send + 'static>;

/// State owned by a stream's strand: the dispatch state machine plus the
/// attached readers.
pub struct StreamInner {
    base: StreamBase,
    readers: Vec<Box<dyn Reader>>,
    strand: Strand,
    shutdown: bool,
}

impl StreamInner {
    /// The dispatch state machine.
    #[must_use]
    pub fn base(&self) -> &StreamBase {
        &self.base
    }

    /// Mutable access to the dispatch state machine.
    pub fn base_mut(&mut self) -> &mut StreamBase {
        &mut self.base
    }

    /// The strand this state lives on.
    #[must_use]
    pub fn strand(&self) -> &Strand {
        &self.strand
    }

    /// Stop the readers in reverse insertion order, then the stream
    /// itself. Idempotent.
    fn terminate(&mut self) {
        while let Some(mut reader) = self.readers.pop() {
            reader.stop();
        }
        self.base.stop();
        self.shutdown = true;
    }
}

/// Handle for queueing tasks onto a stream's serialization queue.
#[derive(Clone)]
pub struct Strand {
    tx: UnboundedSender<StrandTask>,
}

impl Strand {
    /// Queue `task` for exclusive execution against the stream state, in
    /// FIFO order. Returns `false` if the stream has already shut down.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut StreamInner) + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

/// A receive stream whose state is mutated only on its strand.
///
/// Readers attached with [`Stream::add_reader`] produce packets on the
/// strand; the sink receives heaps on the strand. [`Stream::stop`]
/// blocks an external caller until shutdown has finished; an
/// end-of-stream control packet stops the stream from within without
/// blocking.
///
/// Dropping the stream stops it.
pub struct Stream {
    strand: Strand,
}

impl Stream {
    /// Create a stream whose strand runs on `pool`, delivering heaps to
    /// `sink`.
    #[must_use]
    pub fn new<S: HeapSink + 'static>(pool: &ThreadPool, config: StreamConfig, sink: S) -> Self {
        let (tx, mut rx) = unbounded_channel::<StrandTask>();
        let strand = Strand { tx };
        let base = StreamBase::new(config, Box::new(sink));
        let mut inner = StreamInner {
            base,
            readers: Vec::new(),
            strand: strand.clone(),
            shutdown: false,
        };
        pool.handle().spawn(async move {
            while let Some(task) = rx.recv().await {
                task(&mut inner);
                if inner.base.is_stopped() && !inner.shutdown {
                    // Stop requested from within a strand task (e.g. an
                    // end-of-stream packet seen by a reader callback).
                    // Tearing down here, between tasks, avoids
                    // re-entering the reader that posted the task.
                    inner.terminate();
                }
                if inner.shutdown {
                    break;
                }
            }
        });
        Self { strand }
    }

    /// The stream's strand.
    #[must_use]
    pub fn strand(&self) -> &Strand {
        &self.strand
    }

    /// Attach a reader and start it on the strand. Readers are stopped
    /// in reverse insertion order at shutdown.
    pub fn add_reader<R: Reader>(&self, reader: R) {
        self.strand.post(move |inner| {
            if inner.base.is_stopped() {
                return;
            }
            let mut reader: Box<dyn Reader> = Box::new(reader);
            reader.start(inner);
            inner.readers.push(reader);
        });
    }

    /// Change the live-heap cap.
    pub fn set_max_heaps(&self, max_heaps: usize) {
        self.strand
            .post(move |inner| inner.base.set_max_heaps(max_heaps));
    }

    /// Use `allocator` for the payload memory of new heaps.
    pub fn set_allocator(&self, allocator: Arc<dyn MemoryAllocator>) {
        self.strand
            .post(move |inner| inner.base.set_allocator(allocator));
    }

    /// Shut the stream down: stop every reader in reverse order, flush
    /// live heaps, and block until that has finished. Idempotent.
    ///
    /// Must not be called from a task running on this stream's strand;
    /// stream-control packets already stop the stream through a deferred
    /// path.
    pub fn stop(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        let posted = self.strand.post(move |inner| {
            inner.terminate();
            let _ = done_tx.send(());
        });
        if posted {
            // Err means the strand dropped the task while shutting down,
            // which is just as final
            let _ = done_rx.recv();
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
