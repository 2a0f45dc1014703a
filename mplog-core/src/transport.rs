//! Newline-delimited JSON records over TCP, for producers living in other
//! processes.

use std::{
    io::{self, BufRead, BufReader, BufWriter, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};

use crate::{
    aggregator::RecordSender,
    error::{EnqueueError, ErrorHandler, LogError},
    record::Record,
};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// A connection that stays silent this long after shutdown is considered drained.
const IDLE_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Producer-side handle for a process that is not the aggregator's.
pub struct RemoteSender {
    stream: BufWriter<TcpStream>,
    errors: ErrorHandler,
    closed: bool,
}

impl RemoteSender {
    pub fn connect<A: ToSocketAddrs>(addr: A, errors: ErrorHandler) -> Result<Self, LogError> {
        let stream = TcpStream::connect(addr).map_err(LogError::Transport)?;
        stream.set_nodelay(true).map_err(LogError::Transport)?;
        Ok(Self {
            stream: BufWriter::new(stream),
            errors,
            closed: false,
        })
    }

    /// Resolves pending arguments and sends the record. Failures are reported.
    pub fn enqueue(&mut self, mut record: Record) {
        if let Err(err) = record.resolve_args() {
            self.errors.report(&err);
        }
        if let Err(err) = self.send(&record) {
            self.errors.report(&err);
        }
    }

    fn send(&mut self, record: &Record) -> Result<(), LogError> {
        if self.closed {
            return Err(EnqueueError::Closed.into());
        }
        let line = record.to_wire()?;
        self.stream
            .write_all(line.as_bytes())
            .and_then(|()| self.stream.write_all(b"\n"))
            .map_err(LogError::Transport)
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.stream.flush().map_err(LogError::Transport)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Flushes pending records and ends the connection. Only the first call does anything.
    pub fn close(&mut self) -> Result<(), LogError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush()?;
        self.stream
            .get_ref()
            .shutdown(Shutdown::Write)
            .map_err(LogError::Transport)
    }
}

impl Drop for RemoteSender {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            self.errors.report(&err);
        }
    }
}

/// Shutdown request shared by the acceptor and its connection readers.
#[derive(Default)]
struct Stop {
    requested: AtomicBool,
    deadline: OnceLock<Instant>,
    cut_off: AtomicBool,
}

impl Stop {
    fn request(&self, deadline: Option<Instant>) {
        if let Some(deadline) = deadline {
            let _ = self.deadline.set(deadline);
        }
        self.requested.store(true, Ordering::Release);
    }

    fn requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// True once a reader has to give up on a connection that keeps sending.
    fn expired(&self) -> bool {
        self.requested()
            && self
                .deadline
                .get()
                .is_some_and(|deadline| Instant::now() >= *deadline)
    }
}

struct Acceptor {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Accepting side, owned by an aggregator.
pub(crate) struct Listener {
    local_addr: SocketAddr,
    stop: Arc<Stop>,
    acceptor: Option<Acceptor>,
}

impl Listener {
    pub(crate) fn bind<A: ToSocketAddrs>(addr: A, sender: RecordSender) -> Result<Self, LogError> {
        let listener = TcpListener::bind(addr).map_err(LogError::Transport)?;
        listener.set_nonblocking(true).map_err(LogError::Transport)?;
        let local_addr = listener.local_addr().map_err(LogError::Transport)?;
        let stop = Arc::new(Stop::default());
        let (done_sender, done) = bounded(1);
        let handle = thread::Builder::new()
            .name("mplog-listener".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || {
                    accept_loop(listener, sender, stop);
                    let _ = done_sender.send(());
                }
            })?;
        Ok(Self {
            local_addr,
            stop,
            acceptor: Some(Acceptor { handle, done }),
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and waits until every connection has gone quiet.
    ///
    /// Connections still sending at `deadline` are cut off. Returns false
    /// when that happened or the readers outlived the deadline.
    pub(crate) fn shutdown(mut self, deadline: Option<Instant>) -> bool {
        self.stop.request(deadline);
        let Some(Acceptor { handle, done }) = self.acceptor.take() else {
            return true;
        };
        let finished = match deadline {
            Some(deadline) => !matches!(
                done.recv_deadline(deadline),
                Err(RecvTimeoutError::Timeout)
            ),
            None => {
                let _ = done.recv();
                true
            }
        };
        // readers past the deadline stop on their next read, leave them detached
        if finished {
            let _ = handle.join();
        }
        finished && !self.stop.cut_off.load(Ordering::Acquire)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop.request(None);
    }
}

fn accept_loop(listener: TcpListener, sender: RecordSender, stop: Arc<Stop>) {
    let mut readers = Vec::new();
    loop {
        let stopping = stop.requested();
        match listener.accept() {
            Ok((stream, _)) => {
                let reader = thread::Builder::new().name("mplog-connection".into()).spawn({
                    let sender = sender.clone();
                    let stop = Arc::clone(&stop);
                    move || read_loop(stream, sender, stop)
                });
                match reader {
                    Ok(reader) => readers.push(reader),
                    Err(err) => sender.report(&LogError::Transport(err)),
                }
            }
            // connections still in the backlog are taken before stopping
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if stopping {
                    break;
                }
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                sender.report(&LogError::Transport(err));
                if stopping {
                    break;
                }
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    for reader in readers {
        let _ = reader.join();
    }
}

fn read_loop(stream: TcpStream, sender: RecordSender, stop: Arc<Stop>) {
    if let Err(err) = stream
        .set_nonblocking(false)
        .and_then(|()| stream.set_read_timeout(Some(IDLE_READ_TIMEOUT)))
    {
        sender.report(&LogError::Transport(err));
        return;
    }
    let mut reader = BufReader::new(stream);
    // kept across timeouts, a read may stop in the middle of a line
    let mut line = Vec::new();
    loop {
        if stop.expired() {
            stop.cut_off.store(true, Ordering::Release);
            // a partial line would only decode as garbage
            return;
        }
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) if line.ends_with(b"\n") => {
                forward(&line, &sender);
                line.clear();
            }
            Ok(_) => {}
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                if stop.requested() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                sender.report(&LogError::Transport(err));
                break;
            }
        }
    }
    if !line.is_empty() {
        forward(&line, &sender);
    }
}

fn forward(line: &[u8], sender: &RecordSender) {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match Record::from_wire(text) {
        Ok(record) => sender.enqueue(record),
        Err(err) => sender.report(&err),
    }
}
