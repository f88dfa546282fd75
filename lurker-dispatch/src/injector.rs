//! Background frame injection
//!
//! The dispatch thread hands serialized frames to an [`Injector`], which owns
//! the [`FrameSink`] on its own thread. The queue is bounded; when it is full
//! the oldest queued frame is discarded and counted.

use lurker_core::{Error, FrameSink, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Bounded FIFO that discards its oldest element on overflow
#[derive(Debug)]
pub struct DropOldestQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> DropOldestQueue<T> {
    /// Queue holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the element evicted to make room
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Injection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectorStats {
    /// Frames accepted by the sink
    pub sent: u64,
    /// Frames discarded because the queue was full
    pub dropped: u64,
    /// Frames the sink refused
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> InjectorStats {
        InjectorStats {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct Queue {
    frames: DropOldestQueue<Vec<u8>>,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    counters: Counters,
}

/// Owns a [`FrameSink`] on a background thread
pub struct Injector {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    sink_name: String,
}

impl Injector {
    /// Start the injection thread
    pub fn spawn(mut sink: Box<dyn FrameSink>, capacity: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                frames: DropOldestQueue::new(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            counters: Counters::default(),
        });
        let sink_name = sink.describe();

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("lurker-inject".to_string())
            .spawn(move || run_worker(&worker_shared, sink.as_mut()))
            .map_err(|e| Error::transmit(format!("failed to start injector thread: {}", e)))?;

        info!(sink = %sink_name, capacity, "Injector started");
        Ok(Self {
            shared,
            worker: Some(worker),
            sink_name,
        })
    }

    /// Queue a frame for transmission; never blocks on the sink
    pub fn enqueue(&self, frame: Vec<u8>) {
        let evicted = {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                debug!("Injector closed, frame discarded");
                self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            queue.frames.push(frame)
        };
        self.shared.available.notify_one();

        if let Some(old) = evicted {
            let dropped = self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(len = old.len(), dropped, "Injection queue full, oldest frame dropped");
        }
    }

    pub fn stats(&self) -> InjectorStats {
        self.shared.counters.snapshot()
    }

    /// Frames waiting for the sink
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().frames.len()
    }

    /// Stop accepting frames, drain the queue and join the thread
    pub fn shutdown(mut self) -> InjectorStats {
        self.close();
        self.stats()
    }

    fn close(&mut self) {
        self.shared.queue.lock().closed = true;
        self.shared.available.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(sink = %self.sink_name, "Injector thread panicked");
            }
            let stats = self.stats();
            info!(
                sink = %self.sink_name,
                sent = stats.sent,
                dropped = stats.dropped,
                failed = stats.failed,
                "Injector stopped"
            );
        }
    }
}

impl Drop for Injector {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(shared: &Shared, sink: &mut dyn FrameSink) {
    loop {
        let frame = {
            let mut queue = shared.queue.lock();
            while queue.frames.is_empty() && !queue.closed {
                shared.available.wait(&mut queue);
            }
            match queue.frames.pop() {
                Some(frame) => frame,
                // Closed and drained
                None => break,
            }
        };

        match sink.transmit(&frame) {
            Ok(()) => {
                shared.counters.sent.fetch_add(1, Ordering::Relaxed);
                debug!(len = frame.len(), "Frame injected");
            }
            Err(e) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(len = frame.len(), error = %e, "Frame injection failed");
            }
        }
    }
}
