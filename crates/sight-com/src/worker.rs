//! Single-threaded task executors used as slot execution contexts.
//!
//! A [`Worker`] owns one dedicated thread and a FIFO task queue. Tasks run
//! sequentially in submission order, which gives asynchronous slot delivery
//! its per-slot ordering guarantee. Workers also drive the [`Timer`]s created
//! from them.
//!
//! # Example
//!
//! ```
//! use sight_com::worker::WorkerBuilder;
//!
//! let worker = WorkerBuilder::new().name("io").build().unwrap();
//!
//! worker.post(|| println!("running on the io worker")).unwrap();
//!
//! // Drains the queue and joins the thread.
//! worker.stop();
//! ```
//!
//! # Lifecycle
//!
//! [`Worker::stop`] drains pending tasks and joins the thread exactly once.
//! Dropping the last handle performs the same shutdown. When the last handle
//! is released on the worker's own thread, shutdown is requested without a
//! join and the thread exits after draining.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use parking_lot::{Mutex, RwLock};

use crate::error::WorkerError;
use crate::logging::{panic_message, targets};
use crate::timer::{Timer, TimerQueue};

/// Key under which [`ActiveWorkers`] stores the default worker.
pub const DEFAULT_WORKER: &str = "sight_com::default_worker";

/// Configuration for creating a Worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name for the worker thread.
    pub name: String,
    /// Stack size for the worker thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Capacity of the task queue. `None` means unbounded.
    pub queue_capacity: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "sight-worker".to_string(),
            stack_size: None,
            queue_capacity: None,
        }
    }
}

impl WorkerConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for creating Workers with custom configuration.
#[derive(Debug, Default)]
pub struct WorkerBuilder {
    config: WorkerConfig,
}

impl WorkerBuilder {
    /// Create a new WorkerBuilder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size for the worker thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Bound the task queue. Posting to a full queue fails with
    /// [`WorkerError::QueueFull`].
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    /// Build and start the worker.
    pub fn build(self) -> Result<Worker, WorkerError> {
        Worker::with_config(self.config)
    }
}

/// State shared between worker handles, timers and the worker thread.
pub(crate) struct WorkerState {
    /// Whether the worker accepts new tasks.
    running: AtomicBool,
    /// Held shared while a task is handed to the queue and exclusively
    /// while `running` is cleared, so no accepted task lands behind the
    /// shutdown drain.
    post_gate: RwLock<()>,
    /// Count of tasks queued but not yet finished.
    pending_tasks: AtomicUsize,
    /// Wake-up requests for the loop, kept apart from the task queue.
    wake: Sender<()>,
    /// Pending timer firings, ordered by deadline.
    pub(crate) timers: Mutex<TimerQueue>,
}

/// A message consumed by the worker loop.
pub(crate) enum WorkerMessage {
    /// Run a task.
    Task(Box<dyn FnOnce() + Send>),
    /// Drain the queue and exit.
    Shutdown,
}

struct WorkerInner {
    name: String,
    sender: Sender<WorkerMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    state: Arc<WorkerState>,
}

impl WorkerInner {
    fn stop(&self) -> bool {
        let Some(handle) = self.handle.lock().take() else {
            return false;
        };

        {
            let _gate = self.state.post_gate.write();
            self.state.running.store(false, Ordering::Release);
        }

        if thread::current().id() == self.thread_id {
            // A full bounded queue cannot drain while we wait on it here; the
            // loop still exits once every sender is gone.
            let _ = self.sender.try_send(WorkerMessage::Shutdown);
            tracing::debug!(
                target: targets::WORKER,
                worker = %self.name,
                "stop requested from the worker thread, not joining"
            );
            return true;
        }

        // The loop drains the queue, so a blocking send on a bounded queue
        // only waits for room.
        let _ = self.sender.send(WorkerMessage::Shutdown);
        if handle.join().is_err() {
            tracing::error!(target: targets::WORKER, worker = %self.name, "worker thread panicked");
        }
        tracing::debug!(target: targets::WORKER, worker = %self.name, "worker stopped");
        true
    }
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A dedicated thread with its own serialized task queue.
///
/// `Worker` is a cheap handle: clones share the same thread. The thread is
/// stopped and joined by [`stop`](Self::stop) or when the last handle is
/// dropped.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// Create a new worker with default configuration.
    ///
    /// The worker thread starts immediately and begins processing tasks.
    pub fn new() -> Result<Self, WorkerError> {
        Self::with_config(WorkerConfig::default())
    }

    /// Create a new worker with custom configuration.
    pub fn with_config(config: WorkerConfig) -> Result<Self, WorkerError> {
        let (sender, receiver) = match config.queue_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        // One pending wake-up is enough to make the loop re-read its timers.
        let (wake, wakes) = bounded(1);
        let state = Arc::new(WorkerState {
            running: AtomicBool::new(true),
            post_gate: RwLock::new(()),
            pending_tasks: AtomicUsize::new(0),
            wake,
            timers: Mutex::new(TimerQueue::new()),
        });

        let thread_state = state.clone();
        let thread_name = config.name.clone();

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || {
                worker_loop(&thread_name, receiver, wakes, &thread_state);
                thread_state.running.store(false, Ordering::Release);
            })
            .map_err(|err| WorkerError::Spawn(err.to_string()))?;

        tracing::debug!(target: targets::WORKER, worker = %config.name, "worker started");

        Ok(Self {
            inner: Arc::new(WorkerInner {
                name: config.name,
                sender,
                thread_id: handle.thread().id(),
                handle: Mutex::new(Some(handle)),
                state,
            }),
        })
    }

    /// The worker's thread name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Check if the worker still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.inner.state.running.load(Ordering::Acquire)
    }

    /// Get the number of queued or executing tasks.
    pub fn pending_tasks(&self) -> usize {
        self.inner.state.pending_tasks.load(Ordering::Acquire)
    }

    /// The id of the worker's thread.
    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }

    /// Whether the calling thread is this worker's thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Queue a task for execution on the worker thread.
    ///
    /// Returns immediately. A panic inside the task is caught and logged
    /// on the worker thread; it never reaches the poster.
    pub fn post<F>(&self, task: F) -> Result<(), WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let _gate = self.inner.state.post_gate.read();
        if !self.is_running() {
            return Err(WorkerError::Stopped);
        }

        self.inner.state.pending_tasks.fetch_add(1, Ordering::AcqRel);

        match self.inner.sender.try_send(WorkerMessage::Task(Box::new(task))) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.state.pending_tasks.fetch_sub(1, Ordering::AcqRel);
                match err {
                    TrySendError::Full(_) => Err(WorkerError::QueueFull),
                    TrySendError::Disconnected(_) => Err(WorkerError::Stopped),
                }
            }
        }
    }

    /// Stop the worker: reject new tasks, run the ones already queued, and
    /// join the thread.
    ///
    /// Returns `true` for the call that performed the shutdown and `false`
    /// if the worker was already stopped.
    pub fn stop(&self) -> bool {
        self.inner.stop()
    }

    /// Create a timer whose callback runs on this worker's thread.
    pub fn create_timer(&self) -> Timer {
        Timer::new(self.clone())
    }

    pub(crate) fn state(&self) -> &Arc<WorkerState> {
        &self.inner.state
    }

    /// Make the loop recompute its next timer deadline.
    pub(crate) fn wake(&self) {
        let _ = self.inner.state.wake.try_send(());
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

/// The main worker loop that processes tasks and timers.
fn worker_loop(
    name: &str,
    receiver: Receiver<WorkerMessage>,
    wakes: Receiver<()>,
    state: &WorkerState,
) {
    loop {
        let next_deadline = state.timers.lock().time_until_next();
        // `None` means a wake-up or an elapsed deadline.
        let message = match next_deadline {
            Some(timeout) => select! {
                recv(receiver) -> message => Some(message),
                recv(wakes) -> _ => None,
                default(timeout) => None,
            },
            None => select! {
                recv(receiver) -> message => Some(message),
                recv(wakes) -> _ => None,
            },
        };

        match message {
            None => {}
            Some(Ok(WorkerMessage::Task(task))) => run_task(name, state, task),
            Some(Ok(WorkerMessage::Shutdown)) => {
                // Process remaining tasks before exiting
                while let Ok(message) = receiver.try_recv() {
                    if let WorkerMessage::Task(task) = message {
                        run_task(name, state, task);
                    }
                }
                break;
            }
            Some(Err(_)) => break,
        }

        let expired = state.timers.lock().take_expired();
        for entry in expired {
            entry.fire(&state.timers);
        }
    }
}

fn run_task(name: &str, state: &WorkerState, task: Box<dyn FnOnce() + Send>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        tracing::error!(
            target: targets::WORKER,
            worker = %name,
            "task panicked: {}",
            panic_message(payload.as_ref())
        );
    }
    state.pending_tasks.fetch_sub(1, Ordering::AcqRel);
}

/// Process-wide registry of named workers.
///
/// Components look up the worker they should run on by key; the default
/// worker is created on first use.
pub struct ActiveWorkers {
    workers: Mutex<HashMap<String, Worker>>,
}

static ACTIVE_WORKERS: OnceLock<ActiveWorkers> = OnceLock::new();

/// Get the process-wide worker registry.
pub fn active_workers() -> &'static ActiveWorkers {
    ACTIVE_WORKERS.get_or_init(ActiveWorkers::new)
}

impl ActiveWorkers {
    fn new() -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Get the default worker, spawning it on first use.
    pub fn default_worker(&self) -> Result<Worker, WorkerError> {
        let mut workers = self.workers.lock();
        if let Some(worker) = workers.get(DEFAULT_WORKER) {
            return Ok(worker.clone());
        }
        let worker = WorkerBuilder::new().name("sight-default").build()?;
        workers.insert(DEFAULT_WORKER.to_string(), worker.clone());
        Ok(worker)
    }

    /// Register a worker under `key`, returning the worker it replaces.
    pub fn add_worker(&self, key: impl Into<String>, worker: Worker) -> Option<Worker> {
        self.workers.lock().insert(key.into(), worker)
    }

    /// Look up a worker by key.
    pub fn worker(&self, key: &str) -> Option<Worker> {
        self.workers.lock().get(key).cloned()
    }

    /// Remove a worker from the registry without stopping it.
    pub fn remove_worker(&self, key: &str) -> Option<Worker> {
        self.workers.lock().remove(key)
    }

    /// Stop every registered worker and empty the registry.
    pub fn reset(&self) {
        let workers: Vec<Worker> = self.workers.lock().drain().map(|(_, w)| w).collect();
        let count = workers.len();
        for worker in workers {
            worker.stop();
        }
        tracing::debug!(target: targets::CORE, workers = count, "active workers reset");
    }
}

static_assertions::assert_impl_all!(Worker: Send, Sync);
