//! The process-wide guest runtime.
//!
//! There is at most one guest runtime per process. It moves through three
//! states exactly once each: uninitialized, running, torn down. A runtime
//! that has been torn down cannot be started again.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{
    config::Config,
    error::BridgeError,
    runtime::{session::Session, worker::Worker},
};

enum RuntimeState {
    Uninitialized,
    Running(Arc<Worker>),
    TornDown,
}

static RUNTIME: Mutex<RuntimeState> = Mutex::new(RuntimeState::Uninitialized);

/// Starts the guest runtime.
pub fn initialize(config: Config) -> Result<(), BridgeError> {
    let mut state = RUNTIME.lock();
    match *state {
        RuntimeState::Running(_) => Err(BridgeError::AlreadyInitialized),
        RuntimeState::TornDown => Err(BridgeError::TornDown),
        RuntimeState::Uninitialized => {
            let worker = Worker::spawn(config)?;
            log::info!("guest runtime started (session {})", worker.session_id());
            *state = RuntimeState::Running(Arc::new(worker));
            Ok(())
        }
    }
}

pub fn is_initialized() -> bool {
    matches!(*RUNTIME.lock(), RuntimeState::Running(_))
}

fn worker() -> Result<Arc<Worker>, BridgeError> {
    match &*RUNTIME.lock() {
        RuntimeState::Running(worker) => Ok(Arc::clone(worker)),
        RuntimeState::Uninitialized => Err(BridgeError::NotInitialized),
        RuntimeState::TornDown => Err(BridgeError::TornDown),
    }
}

/// Runs `job` on the guest worker and waits for its result.
///
/// Jobs from all threads run one at a time, in the order they were
/// submitted. A panic inside `job` is resumed on the calling thread.
pub fn submit<R, F>(job: F) -> Result<R, BridgeError>
where
    R: Send + 'static,
    F: FnOnce(&Session) -> R + Send + 'static,
{
    worker()?.submit(job)
}

/// Like [`submit`], but gives up waiting after `timeout`. The job itself is
/// not cancelled.
pub fn submit_timeout<R, F>(timeout: Duration, job: F) -> Result<R, BridgeError>
where
    R: Send + 'static,
    F: FnOnce(&Session) -> R + Send + 'static,
{
    worker()?.submit_timeout(timeout, job)
}

/// Shuts the guest runtime down for the rest of the process.
///
/// Jobs already queued still run. Automatic links created by the runtime
/// stay safe to drop afterwards, but can no longer be adopted.
pub fn teardown() -> Result<(), BridgeError> {
    let worker = {
        let mut state = RUNTIME.lock();
        let worker = match &*state {
            RuntimeState::Running(worker) if worker.is_current_thread() => {
                return Err(BridgeError::Reentrant);
            }
            RuntimeState::Running(worker) => Arc::clone(worker),
            RuntimeState::Uninitialized => return Err(BridgeError::NotInitialized),
            RuntimeState::TornDown => return Err(BridgeError::TornDown),
        };
        *state = RuntimeState::TornDown;
        worker
    };
    worker.shutdown()?;
    log::info!("guest runtime torn down (session {})", worker.session_id());
    Ok(())
}
