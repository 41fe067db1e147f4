//! The guest worker: one thread that owns the session and runs jobs in
//! submission order.
//!
//! Callers block until their job has run. A job that panics is caught on
//! the worker and the panic is resumed in the caller; the worker itself keeps
//! going. Before each job the worker drains the automatic-link finalizer
//! queue.

use std::{
    any::Any,
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;

use crate::{config::Config, error::BridgeError, runtime::session::Session};

type Job = Box<dyn FnOnce(&Session) + Send>;
type Reply<R> = Result<R, Box<dyn Any + Send>>;

thread_local! {
    /// Session id of the worker running on this thread.
    static CURRENT_WORKER: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Session id of the guest worker owning the current thread, if any.
pub fn current_worker() -> Option<u64> {
    CURRENT_WORKER.with(Cell::get)
}

pub struct Worker {
    sender: Mutex<Option<Sender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    session_id: u64,
}

impl Worker {
    /// Starts the worker thread and builds its session there.
    pub fn spawn(config: Config) -> Result<Self, BridgeError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<u64>();
        let name = config.worker_name.clone();

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || run(config, receiver, ready_tx))
            .map_err(|err| BridgeError::Config(format!("cannot start guest worker: {}", err)))?;

        let session_id = ready_rx.recv().map_err(|_| BridgeError::WorkerStopped)?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
            session_id,
        })
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Returns whether the calling thread is this worker's own thread.
    /// Waiting on this worker from there would never finish.
    pub fn is_current_thread(&self) -> bool {
        current_worker() == Some(self.session_id)
    }

    /// Runs `job` on the worker and waits for its result.
    pub fn submit<R, F>(&self, job: F) -> Result<R, BridgeError>
    where
        R: Send + 'static,
        F: FnOnce(&Session) -> R + Send + 'static,
    {
        let reply = self.dispatch(job)?;
        match reply.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(BridgeError::WorkerStopped),
        }
    }

    /// Like [`submit`](Self::submit), but stops waiting after `timeout`.
    ///
    /// On timeout the job is not interrupted: it still runs to completion
    /// on the worker and its result is discarded.
    pub fn submit_timeout<R, F>(&self, timeout: Duration, job: F) -> Result<R, BridgeError>
    where
        R: Send + 'static,
        F: FnOnce(&Session) -> R + Send + 'static,
    {
        let reply = self.dispatch(job)?;
        match reply.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(RecvTimeoutError::Timeout) => Err(BridgeError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::WorkerStopped),
        }
    }

    fn dispatch<R, F>(&self, job: F) -> Result<Receiver<Reply<R>>, BridgeError>
    where
        R: Send + 'static,
        F: FnOnce(&Session) -> R + Send + 'static,
    {
        if self.is_current_thread() {
            return Err(BridgeError::Reentrant);
        }
        let (reply_tx, reply_rx) = mpsc::channel();
        let job: Job = Box::new(move |session: &Session| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| job(session)));
            // The caller may have stopped waiting.
            let _ = reply_tx.send(result);
        });

        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(BridgeError::WorkerStopped)?;
        sender.send(job).map_err(|_| BridgeError::WorkerStopped)?;
        Ok(reply_rx)
    }

    /// Stops accepting jobs, lets queued ones finish, and joins the thread.
    /// Returns `false` if the worker was already stopped.
    pub fn shutdown(&self) -> Result<bool, BridgeError> {
        if self.is_current_thread() {
            return Err(BridgeError::Reentrant);
        }
        if self.sender.lock().take().is_none() {
            return Ok(false);
        }
        if let Some(thread) = self.thread.lock().take() {
            thread.join().map_err(|_| BridgeError::WorkerStopped)?;
        }
        Ok(true)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("guest worker did not shut down cleanly: {}", err);
        }
    }
}

fn run(config: Config, receiver: Receiver<Job>, ready: Sender<u64>) {
    let trace = config.trace;
    let session = Session::new(config);
    CURRENT_WORKER.with(|current| current.set(Some(session.id())));
    if ready.send(session.id()).is_err() {
        return;
    }
    drop(ready);

    let mut jobs: u64 = 0;
    for job in receiver {
        jobs += 1;
        let released = session.drain_finalizers();
        if trace {
            log::info!(
                "session {}: job {} ({} links released, {} live cells)",
                session.id(),
                jobs,
                released,
                session.stats().live
            );
        }
        job(&session);
    }

    session.collect();
    log::debug!("session {} stopped after {} jobs", session.id(), jobs);
}
