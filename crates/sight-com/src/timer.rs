//! Timers bound to a worker's execution loop.
//!
//! Provides one-shot and repeating timers whose callbacks run on the thread
//! of the [`Worker`] that created them.
//!
//! Every (re)arm bumps the timer's generation. Queue entries carry the
//! generation they were armed with, and an entry whose generation no longer
//! matches is discarded, so a timer has at most one live pending firing.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::logging::{panic_message, targets};
use crate::worker::Worker;

/// Default timer interval.
const DEFAULT_DURATION: Duration = Duration::from_secs(1);

type TimerFn = Arc<dyn Fn() + Send + Sync>;

struct TimerState {
    duration: Duration,
    one_shot: bool,
    running: bool,
    function: Option<TimerFn>,
}

pub(crate) struct TimerInner {
    /// Bumped under the state lock on every arm and stop.
    generation: AtomicU64,
    state: Mutex<TimerState>,
}

/// A one-shot or repeating callback scheduled on a worker.
///
/// Created with [`Worker::create_timer`]. All mutating operations take the
/// timer's own lock, so they may be called concurrently from any thread.
/// Dropping the timer cancels any pending firing.
///
/// # Example
///
/// ```
/// use sight_com::Worker;
/// use std::time::Duration;
///
/// let worker = Worker::new().unwrap();
/// let timer = worker.create_timer();
/// timer.set_function(|| println!("tick"));
/// timer.set_duration(Duration::from_millis(10));
/// timer.set_one_shot(true);
/// timer.start();
/// ```
pub struct Timer {
    inner: Arc<TimerInner>,
    worker: Worker,
}

impl Timer {
    pub(crate) fn new(worker: Worker) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                generation: AtomicU64::new(0),
                state: Mutex::new(TimerState {
                    duration: DEFAULT_DURATION,
                    one_shot: false,
                    running: false,
                    function: None,
                }),
            }),
            worker,
        }
    }

    /// Set the callback invoked on each firing.
    pub fn set_function<F>(&self, function: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.state.lock().function = Some(Arc::new(function));
    }

    /// Set the interval. A running timer is re-armed with the new duration.
    pub fn set_duration(&self, duration: Duration) {
        let mut state = self.inner.state.lock();
        state.duration = duration;
        if state.running {
            self.arm(&state);
        }
    }

    /// Choose between a single firing and repeated firings.
    ///
    /// Takes effect at the next firing.
    pub fn set_one_shot(&self, one_shot: bool) {
        self.inner.state.lock().one_shot = one_shot;
    }

    /// Arm the timer, cancelling any pending firing first.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        state.running = true;
        self.arm(&state);
    }

    /// Cancel any pending firing. Stopping a stopped timer does nothing.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if state.running {
            state.running = false;
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            tracing::trace!(target: targets::TIMER, "timer stopped");
        }
    }

    /// Whether a firing is pending.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// The configured interval.
    pub fn duration(&self) -> Duration {
        self.inner.state.lock().duration
    }

    /// Whether the timer fires only once per start.
    pub fn is_one_shot(&self) -> bool {
        self.inner.state.lock().one_shot
    }

    /// The worker this timer fires on.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    // Caller holds the state lock.
    fn arm(&self, state: &TimerState) {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let entry = TimerQueueEntry {
            fire_time: Instant::now() + state.duration,
            timer: Arc::downgrade(&self.inner),
            generation,
        };
        self.worker.state().timers.lock().push(entry);
        self.worker.wake();
        tracing::trace!(target: targets::TIMER, duration = ?state.duration, "timer armed");
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Timer")
            .field("duration", &state.duration)
            .field("one_shot", &state.one_shot)
            .field("running", &state.running)
            .finish()
    }
}

/// An entry in the timer queue (min-heap by fire time).
pub(crate) struct TimerQueueEntry {
    fire_time: Instant,
    timer: Weak<TimerInner>,
    generation: u64,
}

impl TimerQueueEntry {
    fn is_stale(&self) -> bool {
        self.timer
            .upgrade()
            .is_none_or(|timer| timer.generation.load(Ordering::Acquire) != self.generation)
    }

    /// Run the timer callback if this entry is still current, re-arming
    /// repeating timers first.
    pub(crate) fn fire(self, queue: &Mutex<TimerQueue>) {
        let Some(timer) = self.timer.upgrade() else {
            return;
        };

        let function = {
            let mut state = timer.state.lock();
            if !state.running || timer.generation.load(Ordering::Acquire) != self.generation {
                return;
            }
            if state.one_shot {
                state.running = false;
            } else {
                queue.lock().push(TimerQueueEntry {
                    fire_time: Instant::now() + state.duration,
                    timer: self.timer.clone(),
                    generation: self.generation,
                });
            }
            state.function.clone()
        };

        tracing::trace!(target: targets::TIMER, "timer fired");
        if let Some(function) = function {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| function())) {
                tracing::error!(
                    target: targets::TIMER,
                    "timer callback panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

impl PartialEq for TimerQueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time
    }
}

impl Eq for TimerQueueEntry {}

impl PartialOrd for TimerQueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerQueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other.fire_time.cmp(&self.fire_time)
    }
}

/// Pending firings of every timer on one worker.
#[derive(Default)]
pub(crate) struct TimerQueue {
    queue: BinaryHeap<TimerQueueEntry>,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: TimerQueueEntry) {
        self.queue.push(entry);
    }

    /// Get the duration until the next live entry is due, if any.
    pub(crate) fn time_until_next(&mut self) -> Option<Duration> {
        // Clean up cancelled or dropped timers from the front of the queue.
        while self.queue.peek().is_some_and(TimerQueueEntry::is_stale) {
            self.queue.pop();
        }

        self.queue
            .peek()
            .map(|entry| entry.fire_time.saturating_duration_since(Instant::now()))
    }

    /// Remove and return every entry that is due now.
    pub(crate) fn take_expired(&mut self) -> Vec<TimerQueueEntry> {
        let now = Instant::now();
        let mut expired = Vec::new();
        while self.queue.peek().is_some_and(|entry| entry.fire_time <= now) {
            if let Some(entry) = self.queue.pop() {
                expired.push(entry);
            }
        }
        expired
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.queue.len()
    }
}
