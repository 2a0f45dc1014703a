use crate::{
    error::{EnqueueError, ErrorHandler, LogError},
    record::Record,
    sink::{Sink, close_all},
};

/// Synchronous fan-out of records to sinks, for single-process sessions.
pub struct Dispatcher {
    sinks: Vec<Sink>,
    errors: ErrorHandler,
    closed: bool,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Sink>, errors: ErrorHandler) -> Self {
        Self {
            sinks,
            errors,
            closed: false,
        }
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn emit(&mut self, mut record: Record) {
        if self.closed {
            self.errors.report(&LogError::from(EnqueueError::Closed));
            return;
        }
        if let Err(err) = record.resolve_args() {
            self.errors.report(&err);
        }
        record.fold_exception();
        for sink in &mut self.sinks {
            sink.write(&record);
        }
    }

    pub fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }

    /// Closes every sink once, in order. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        close_all(&mut self.sinks, &self.errors);
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}
