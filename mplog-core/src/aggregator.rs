use std::{
    net::{SocketAddr, ToSocketAddrs},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError, bounded, unbounded,
};

use crate::{
    config::MPLOG_CONFIG,
    error::{EnqueueError, ErrorHandler, LogError},
    record::Record,
    sink::{Sink, close_all},
    transport::Listener,
};

/// Lifecycle of an [`Aggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AggregatorState {
    /// Consumer thread launched but not yet polling.
    Starting,
    Running,
    /// Shutdown sentinel queued, consumer finishing the backlog.
    Draining,
    Closed,
}

impl AggregatorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => AggregatorState::Starting,
            1 => AggregatorState::Running,
            2 => AggregatorState::Draining,
            _ => AggregatorState::Closed,
        }
    }
}

enum Envelope {
    Record(Box<Record>),
    Shutdown,
}

struct Shared {
    state: AtomicU8,
    /// Held shared by producers across the state check and the send, and
    /// exclusively by `close` while it leaves `Running`.
    gate: RwLock<()>,
    cancelled: AtomicBool,
    errors: ErrorHandler,
}

impl Shared {
    fn state(&self) -> AggregatorState {
        AggregatorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: AggregatorState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Stops accepting records. Every record accepted before this returns
    /// is already in the queue.
    fn stop_accepting(&self) {
        let _closing = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        self.set_state(AggregatorState::Draining);
    }

    fn advance(&self, from: AggregatorState, to: AggregatorState) {
        let _ = self.state.compare_exchange(
            from as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer handle onto an aggregator queue. Clone it freely, one per
/// thread or task; it never touches the sinks.
#[derive(Clone)]
pub struct RecordSender {
    sender: Sender<Envelope>,
    shared: Arc<Shared>,
}

impl RecordSender {
    /// Queues a record. Failures go to the error handler, never to the caller.
    pub fn enqueue(&self, record: Record) {
        if let Err(err) = self.try_enqueue(record) {
            self.report(&LogError::from(err));
        }
    }

    /// Queues a record without blocking, returning why it was refused.
    ///
    /// Pending arguments are rendered first; a rendering failure is
    /// reported and the record is still queued.
    pub fn try_enqueue(&self, mut record: Record) -> Result<(), EnqueueError> {
        if let Err(err) = record.resolve_args() {
            self.report(&err);
        }
        let _open = self
            .shared
            .gate
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(
            self.shared.state(),
            AggregatorState::Draining | AggregatorState::Closed
        ) {
            return Err(EnqueueError::Closed);
        }
        self.sender
            .try_send(Envelope::Record(Box::new(record)))
            .map_err(|err| match err {
                TrySendError::Full(_) => EnqueueError::QueueFull,
                TrySendError::Disconnected(_) => EnqueueError::Disconnected,
            })
    }

    pub fn state(&self) -> AggregatorState {
        self.shared.state()
    }

    pub(crate) fn report(&self, error: &LogError) {
        self.shared.errors.report(error);
    }
}

/// Tuning of an [`Aggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Queue bound; `None` for an unbounded queue.
    pub capacity: Option<usize>,
    /// Idle consumers flush their sinks at this interval.
    pub flush_interval: Duration,
    /// How long `close` may wait for the consumer; `None` waits forever.
    pub drain_timeout: Option<Duration>,
    pub errors: ErrorHandler,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            capacity: None,
            flush_interval: MPLOG_CONFIG.flush_interval(),
            drain_timeout: MPLOG_CONFIG.drain_timeout(),
            errors: ErrorHandler::default(),
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<Vec<Sink>>,
}

/// Funnels records from any number of producers into one consumer thread
/// that owns the sinks.
///
/// Records are written in queue arrival order, so each producer's records
/// keep their relative order while different producers interleave by
/// enqueue time. Every record is queued whatever its level; each sink
/// applies its own threshold.
pub struct Aggregator {
    sender: RecordSender,
    drain_timeout: Option<Duration>,
    worker: Mutex<Option<Worker>>,
    listeners: Mutex<Vec<Listener>>,
}

impl Aggregator {
    pub fn spawn(sinks: Vec<Sink>, options: AggregatorOptions) -> Result<Self, LogError> {
        let (sender, receiver) = match options.capacity {
            Some(capacity) => bounded(capacity.max(1)),
            None => unbounded(),
        };
        let (done_sender, done) = bounded(1);
        let shared = Arc::new(Shared {
            state: AtomicU8::new(AggregatorState::Starting as u8),
            gate: RwLock::new(()),
            cancelled: AtomicBool::new(false),
            errors: options.errors,
        });
        let consumer = Consumer {
            receiver,
            sinks,
            shared: Arc::clone(&shared),
            flush_interval: options.flush_interval,
        };
        let handle = thread::Builder::new()
            .name("mplog-aggregator".into())
            .spawn(move || {
                let sinks = consumer.run();
                let _ = done_sender.send(sinks);
            })?;
        Ok(Self {
            sender: RecordSender { sender, shared },
            drain_timeout: options.drain_timeout,
            worker: Mutex::new(Some(Worker { handle, done })),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn sender(&self) -> RecordSender {
        self.sender.clone()
    }

    pub fn enqueue(&self, record: Record) {
        self.sender.enqueue(record);
    }

    pub fn state(&self) -> AggregatorState {
        self.sender.state()
    }

    /// Accepts records from other processes on `addr` until the aggregator closes.
    /// Returns the bound address, useful when binding port 0.
    pub fn listen<A: ToSocketAddrs>(&self, addr: A) -> Result<SocketAddr, LogError> {
        if matches!(
            self.state(),
            AggregatorState::Draining | AggregatorState::Closed
        ) {
            return Err(EnqueueError::Closed.into());
        }
        let listener = Listener::bind(addr, self.sender())?;
        let local_addr = listener.local_addr();
        lock(&self.listeners).push(listener);
        Ok(local_addr)
    }

    /// Stops the consumer after the record it is writing, discarding the
    /// backlog, then closes the sinks.
    pub fn abort(&self) -> Result<(), LogError> {
        self.sender.shared.cancelled.store(true, Ordering::Release);
        self.close()
    }

    /// Drains every record queued so far, then closes the sinks in order.
    ///
    /// Connected producer processes first get up to the drain timeout to go
    /// quiet; a connection still sending when it expires is cut off and
    /// `close` ends with [`LogError::DrainTimeout`] once the backlog is
    /// written. The backlog then gets its own drain timeout. Calling it
    /// again is a no-op.
    pub fn close(&self) -> Result<(), LogError> {
        let mut worker = lock(&self.worker);
        let Some(Worker { handle, done }) = worker.take() else {
            return Ok(());
        };
        let listeners_deadline = self.drain_timeout.map(|timeout| Instant::now() + timeout);
        let mut listeners_drained = true;
        for listener in lock(&self.listeners).drain(..) {
            listeners_drained &= listener.shutdown(listeners_deadline);
        }
        let shared = &self.sender.shared;
        shared.stop_accepting();

        let deadline = self.drain_timeout.map(|timeout| Instant::now() + timeout);
        let drained = self.send_shutdown().and_then(|()| match deadline {
            Some(deadline) => done.recv_deadline(deadline).map_err(|err| match err {
                RecvTimeoutError::Timeout => self.timed_out(),
                RecvTimeoutError::Disconnected => LogError::ConsumerPanicked,
            }),
            None => done.recv().map_err(|_| LogError::ConsumerPanicked),
        });
        shared.set_state(AggregatorState::Closed);

        match drained {
            Ok(mut sinks) => {
                let _ = handle.join();
                close_all(&mut sinks, &shared.errors);
                if listeners_drained {
                    Ok(())
                } else {
                    Err(self.timed_out())
                }
            }
            // the stuck consumer keeps its sinks, leave it detached
            Err(err @ LogError::DrainTimeout(_)) => Err(err),
            Err(err) => {
                let _ = handle.join();
                Err(err)
            }
        }
    }

    fn send_shutdown(&self) -> Result<(), LogError> {
        let sender = &self.sender.sender;
        match self.drain_timeout {
            Some(timeout) => match sender.send_timeout(Envelope::Shutdown, timeout) {
                Err(SendTimeoutError::Timeout(_)) => Err(self.timed_out()),
                // consumer already gone, nothing left to drain
                Ok(()) | Err(SendTimeoutError::Disconnected(_)) => Ok(()),
            },
            None => {
                let _ = sender.send(Envelope::Shutdown);
                Ok(())
            }
        }
    }

    fn timed_out(&self) -> LogError {
        LogError::DrainTimeout(self.drain_timeout.unwrap_or_default())
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            self.sender.report(&err);
        }
    }
}

struct Consumer {
    receiver: Receiver<Envelope>,
    sinks: Vec<Sink>,
    shared: Arc<Shared>,
    flush_interval: Duration,
}

impl Consumer {
    fn run(mut self) -> Vec<Sink> {
        self.shared
            .advance(AggregatorState::Starting, AggregatorState::Running);
        let mut last_flush = Instant::now();
        let mut unflushed = false;
        loop {
            if self.shared.cancelled.load(Ordering::Acquire) {
                let dropped = self
                    .receiver
                    .try_iter()
                    .filter(|envelope| matches!(envelope, Envelope::Record(_)))
                    .count();
                self.shared.errors.report(&LogError::Cancelled(dropped));
                break;
            }

            let timeout = self
                .flush_interval
                .saturating_sub(last_flush.elapsed())
                .max(Duration::from_millis(1));
            match self.receiver.recv_timeout(timeout) {
                Ok(Envelope::Record(record)) => {
                    self.dispatch(*record);
                    unflushed = true;
                }
                Ok(Envelope::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            if last_flush.elapsed() >= self.flush_interval {
                if unflushed {
                    self.flush();
                    unflushed = false;
                }
                last_flush = Instant::now();
            }
        }
        self.flush();
        self.sinks
    }

    fn dispatch(&mut self, mut record: Record) {
        record.fold_exception();
        for sink in &mut self.sinks {
            sink.write(&record);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}
