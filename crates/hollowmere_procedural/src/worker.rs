//! # Background Chunk Generation
//!
//! Generation is a pure function of the chunk coordinate, so it can run on
//! worker threads. Results come back over a channel that the chunk manager
//! drains on its own thread; only that drain (commit) touches the cache.
//!
//! ```text
//!   ChunkManager ──coord──> [request channel] ──> worker 0..N ──┐
//!        ^                                                      │
//!        └──────────── [result channel] <──── Chunk ────────────┘
//! ```
//!
//! A result nobody wants any more is simply dropped by the manager:
//! generating it had no side effects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use crate::chunk::{Chunk, ChunkCoord, ChunkGenerator};

/// How long an idle worker waits before re-checking shutdown.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// A pool of chunk generation threads.
pub struct GenerationWorkers {
    requests: Option<Sender<ChunkCoord>>,
    results: Receiver<Chunk>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl GenerationWorkers {
    /// Starts `threads` workers sharing one generator.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a thread cannot be spawned.
    pub fn spawn(generator: Arc<ChunkGenerator>, threads: usize) -> std::io::Result<Self> {
        let (request_tx, request_rx) = unbounded::<ChunkCoord>();
        let (result_tx, result_rx) = unbounded::<Chunk>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads.max(1) {
            let generator = Arc::clone(&generator);
            let requests = request_rx.clone();
            let results = result_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("hollowmere-gen-{index}"))
                .spawn(move || Self::worker_loop(&generator, &requests, &results, &shutdown))?;
            handles.push(handle);
        }
        debug!(threads = handles.len(), "chunk generation workers started");

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            shutdown,
            handles,
        })
    }

    fn worker_loop(
        generator: &ChunkGenerator,
        requests: &Receiver<ChunkCoord>,
        results: &Sender<Chunk>,
        shutdown: &AtomicBool,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            match requests.recv_timeout(IDLE_POLL) {
                Ok(coord) => {
                    if results.send(generator.generate(coord)).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Queues a coordinate. Returns false if the pool is shutting down.
    pub fn request(&self, coord: ChunkCoord) -> bool {
        self.requests
            .as_ref()
            .is_some_and(|tx| tx.send(coord).is_ok())
    }

    /// A finished chunk, if one is ready.
    #[must_use]
    pub fn try_recv(&self) -> Option<Chunk> {
        self.results.try_recv().ok()
    }

    /// Waits up to `timeout` for a finished chunk.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Chunk> {
        self.results.recv_timeout(timeout).ok()
    }

    /// Number of worker threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for GenerationWorkers {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Disconnect so blocked workers wake immediately
        self.requests.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
