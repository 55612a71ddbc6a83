//! Synchronous/background execution of client operations.
//!
//! # Design
//! `TaskScheduler::submit` runs an operation inline while future mode is
//! off and on a fresh OS thread while it is on. Exactly one of the two
//! happens per call, and the caller sees which through `Call`:
//! `Call::Ready` holds the finished value, `Call::Pending` holds the
//! `TaskHandle` for the background run.
//!
//! A handle's result slot is a `Mutex` + `Condvar` pair shared with the
//! worker. Waiting blocks on the condition variable. Errors and panics in
//! the worker are stored in the slot and only surface when the caller
//! retrieves the result. Dropping a handle abandons the result; the worker
//! still runs to completion.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::GeoError;

const WORKER_THREAD_NAME: &str = "geo-task";

/// Whether the build target can run work on another thread.
const THREADS_AVAILABLE: bool = !cfg!(all(target_family = "wasm", target_os = "unknown"));

/// Chooses between inline and background execution per call.
#[derive(Debug)]
pub struct TaskScheduler {
    future_mode: AtomicBool,
    background: bool,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    /// A scheduler that can run background work wherever the target has
    /// OS threads. Future mode starts off.
    pub fn new() -> Self {
        Self {
            future_mode: AtomicBool::new(false),
            background: THREADS_AVAILABLE,
        }
    }

    /// A scheduler that never leaves the calling thread.
    pub fn inline_only() -> Self {
        Self {
            future_mode: AtomicBool::new(false),
            background: false,
        }
    }

    pub fn supports_future_tasks(&self) -> bool {
        self.background
    }

    pub fn future_mode(&self) -> bool {
        self.future_mode.load(Ordering::Acquire)
    }

    /// Switch future mode for subsequent calls.
    ///
    /// Enabling fails with `FutureModeUnsupported` when background work is
    /// not available; the mode is left off in that case.
    pub fn set_future_mode(&self, enabled: bool) -> Result<(), GeoError> {
        if enabled && !self.background {
            return Err(GeoError::FutureModeUnsupported(
                "this scheduler cannot run background work".to_string(),
            ));
        }
        self.future_mode.store(enabled, Ordering::Release);
        Ok(())
    }

    /// Run `op` according to the current future mode.
    ///
    /// Inline: the operation's error is returned directly. Background: the
    /// only error returned here is a failure to start the worker.
    pub fn submit<T, F>(&self, op: F) -> Result<Call<T>, GeoError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, GeoError> + Send + 'static,
    {
        if self.future_mode() {
            self.spawn(op).map(Call::Pending)
        } else {
            op().map(Call::Ready)
        }
    }

    /// Start `op` on a background thread regardless of future mode.
    pub fn spawn<T, F>(&self, op: F) -> Result<TaskHandle<T>, GeoError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, GeoError> + Send + 'static,
    {
        if !self.background {
            return Err(GeoError::FutureModeUnsupported(
                "this scheduler cannot run background work".to_string(),
            ));
        }

        let slot = Arc::new(Slot::new());
        let worker_slot = Arc::clone(&slot);
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    warn!(%reason, "background operation panicked");
                    Err(GeoError::Task(reason))
                });
                worker_slot.fill(outcome);
            })
            .map_err(|e| GeoError::FutureModeUnsupported(format!("could not start worker: {e}")))?;

        debug!("started background operation");
        Ok(TaskHandle { slot })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

struct Slot<T> {
    result: Mutex<Option<Result<T, GeoError>>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Result<T, GeoError>>> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fill(&self, outcome: Result<T, GeoError>) {
        *self.lock() = Some(outcome);
        self.ready.notify_all();
    }
}

/// Caller-owned handle to a background operation.
pub struct TaskHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T> TaskHandle<T> {
    /// True once the operation has produced its result or error.
    pub fn is_done(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Block until the operation finishes and return its outcome.
    pub fn wait(self) -> Result<T, GeoError> {
        let mut guard = self.slot.lock();
        loop {
            if let Some(outcome) = guard.take() {
                return outcome;
            }
            guard = self
                .slot
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait at most `timeout`. Gives the handle back if the operation is
    /// still running.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Result<T, GeoError>, Self> {
        let deadline = Instant::now() + timeout;
        {
            let mut guard = self.slot.lock();
            loop {
                if let Some(outcome) = guard.take() {
                    return Ok(outcome);
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                guard = self
                    .slot
                    .ready
                    .wait_timeout(guard, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }
        Err(self)
    }
}

/// Outcome of submitting an operation: finished inline, or running in the
/// background.
#[must_use = "a pending call only yields its result through wait()"]
#[derive(Debug)]
pub enum Call<T> {
    Ready(T),
    Pending(TaskHandle<T>),
}

impl<T> Call<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Call::Pending(_))
    }

    /// The value, waiting for the background run if there is one.
    pub fn wait(self) -> Result<T, GeoError> {
        match self {
            Call::Ready(value) => Ok(value),
            Call::Pending(handle) => handle.wait(),
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Call::Ready(value) => Some(value),
            Call::Pending(_) => None,
        }
    }

    pub fn into_handle(self) -> Option<TaskHandle<T>> {
        match self {
            Call::Ready(_) => None,
            Call::Pending(handle) => Some(handle),
        }
    }
}
