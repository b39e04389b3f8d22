//! Slots: typed callable endpoints with optional worker affinity.
//!
//! A [`Slot`] wraps a closure taking a reference to an argument tuple. It
//! can be invoked directly, or bound to a [`Worker`] so that asynchronous
//! deliveries run on that worker's thread.
//!
//! # Thread Affinity
//!
//! - [`Slot::run`] always executes on the caller's thread
//! - [`Slot::post`] and [`Slot::async_call`] execute on the bound worker
//! - `Signal::async_emit` posts when a worker is bound and runs inline
//!   otherwise
//!
//! # Example
//!
//! ```
//! use sight_com::{Slot, Worker};
//!
//! let worker = Worker::new().unwrap();
//! let sum = Slot::with_worker(|&(a, b): &(i32, i32)| a + b, &worker);
//!
//! assert_eq!(sum.run(&(1, 2)), 3);
//!
//! let pending = sum.async_call((3, 5)).unwrap();
//! assert_eq!(pending.wait(), Some(8));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::RwLock;

use crate::args::{ErasedArgs, Signature, SlotArgs};
use crate::error::SlotError;
use crate::logging::targets;
use crate::worker::Worker;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a slot, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl SlotId {
    fn next() -> Self {
        Self(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type SlotFn<Args, R> = dyn Fn(&Args) -> R + Send + Sync;

struct SlotInner<Args, R> {
    id: SlotId,
    function: Box<SlotFn<Args, R>>,
    worker: RwLock<Option<Worker>>,
    connections: Arc<AtomicUsize>,
    signature: Signature,
}

/// A typed, invocable endpoint for signals.
///
/// `Args` is the argument tuple the slot receives and `R` the value its
/// closure returns. Cloning is cheap; clones share identity, the worker
/// binding and the connection counter.
pub struct Slot<Args: SlotArgs, R = ()> {
    inner: Arc<SlotInner<Args, R>>,
}

impl<Args: SlotArgs, R> Clone for Slot<Args, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Args: SlotArgs, R: Send + 'static> Slot<Args, R> {
    /// Create a slot without a worker.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&Args) -> R + Send + Sync + 'static,
    {
        Self::from_parts(Box::new(function), None)
    }

    /// Create a slot bound to `worker`.
    pub fn with_worker<F>(function: F, worker: &Worker) -> Self
    where
        F: Fn(&Args) -> R + Send + Sync + 'static,
    {
        Self::from_parts(Box::new(function), Some(worker.clone()))
    }

    /// Create a slot that only holds a weak reference to `target`.
    ///
    /// Once the target has been dropped, invoking the slot does nothing and
    /// returns `None`.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicI32, Ordering};
    /// use sight_com::Slot;
    ///
    /// let counter = Arc::new(AtomicI32::new(0));
    /// let add = Slot::tracked(&counter, |counter, &(n,): &(i32,)| {
    ///     counter.fetch_add(n, Ordering::SeqCst)
    /// });
    ///
    /// assert_eq!(add.run(&(2,)), Some(0));
    /// drop(counter);
    /// assert_eq!(add.run(&(2,)), None);
    /// ```
    pub fn tracked<T, F>(target: &Arc<T>, function: F) -> Slot<Args, Option<R>>
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &Args) -> R + Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(target);
        Slot::new(move |args: &Args| match target.upgrade() {
            Some(target) => Some(function(&target, args)),
            None => {
                tracing::debug!(
                    target: targets::SLOT,
                    "tracked slot target dropped, skipping call"
                );
                None
            }
        })
    }

    fn from_parts(function: Box<SlotFn<Args, R>>, worker: Option<Worker>) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                id: SlotId::next(),
                function,
                worker: RwLock::new(worker),
                connections: Arc::new(AtomicUsize::new(0)),
                signature: Args::signature(),
            }),
        }
    }

    /// Invoke the closure on the current thread, ignoring the worker.
    pub fn run(&self, args: &Args) -> R {
        (self.inner.function)(args)
    }

    /// Invoke the closure on the current thread with owned arguments.
    pub fn call(&self, args: Args) -> R {
        self.run(&args)
    }

    /// Queue an invocation on the bound worker and return immediately.
    ///
    /// The return value of the closure is discarded.
    pub fn post(&self, args: Args) -> Result<(), SlotError> {
        let worker = self.worker().ok_or(SlotError::NoWorker)?;
        let slot = self.clone();
        worker.post(move || {
            slot.run(&args);
        })?;
        Ok(())
    }

    /// Queue an invocation on the bound worker and return a handle to its
    /// result.
    pub fn async_call(&self, args: Args) -> Result<PendingCall<R>, SlotError> {
        let worker = self.worker().ok_or(SlotError::NoWorker)?;
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let slot = self.clone();
        worker.post(move || {
            let _ = sender.send(slot.run(&args));
        })?;
        Ok(PendingCall { receiver })
    }

    /// Deliver on the bound worker, or inline when none is bound.
    ///
    /// A worker that refuses the task drops the call with a warning.
    pub(crate) fn dispatch(&self, args: Args) {
        let Some(worker) = self.worker() else {
            self.run(&args);
            return;
        };

        let slot = self.clone();
        if let Err(error) = worker.post(move || {
            slot.run(&args);
        }) {
            tracing::warn!(
                target: targets::SLOT,
                slot = %self.inner.id,
                worker = worker.name(),
                %error,
                "dropping asynchronous call"
            );
        }
    }
}

impl<Args: SlotArgs, R> Slot<Args, R> {
    /// The slot's identity.
    pub fn id(&self) -> SlotId {
        self.inner.id
    }

    /// The argument signature the slot receives.
    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Number of live connections referencing this slot.
    pub fn num_connections(&self) -> usize {
        self.inner.connections.load(Ordering::Acquire)
    }

    /// The worker used for asynchronous delivery.
    pub fn worker(&self) -> Option<Worker> {
        self.inner.worker.read().clone()
    }

    /// Bind or rebind the worker. Affects only future deliveries.
    pub fn set_worker(&self, worker: &Worker) {
        *self.inner.worker.write() = Some(worker.clone());
    }

    /// Remove the worker binding; asynchronous deliveries then run inline.
    pub fn clear_worker(&self) {
        *self.inner.worker.write() = None;
    }

    pub(crate) fn link(&self) -> SlotLink {
        SlotLink::new(self.inner.connections.clone())
    }
}

impl<Args: SlotArgs, R> fmt::Debug for Slot<Args, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.inner.id)
            .field("signature", &self.inner.signature)
            .field("num_connections", &self.num_connections())
            .field("worker", &self.inner.worker.read().as_ref().map(|w| w.name().to_string()))
            .finish()
    }
}

/// The result of a [`Slot::async_call`] that may not have run yet.
pub struct PendingCall<R> {
    receiver: Receiver<R>,
}

impl<R> PendingCall<R> {
    /// Block until the call has run.
    ///
    /// Returns `None` if the closure panicked or the worker stopped first.
    pub fn wait(self) -> Option<R> {
        self.receiver.recv().ok()
    }

    /// Block until the call has run or `timeout` elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<R> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Take the result if the call already ran.
    pub fn try_result(&self) -> Option<R> {
        self.receiver.try_recv().ok()
    }
}

impl<R> fmt::Debug for PendingCall<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("ready", &!self.receiver.is_empty())
            .finish()
    }
}

/// One unit of a slot's connection counter, released on drop.
pub(crate) struct SlotLink {
    counter: Arc<AtomicUsize>,
}

impl SlotLink {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for SlotLink {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Object-safe view of a slot whose argument types are only known at runtime.
pub(crate) trait AnySlot: Send + Sync {
    fn id(&self) -> SlotId;
    fn signature(&self) -> &Signature;
    fn num_connections(&self) -> usize;
    fn link(&self) -> SlotLink;
    fn set_worker(&self, worker: Option<&Worker>);
    fn run_erased(&self, args: &ErasedArgs);
    fn dispatch_erased(&self, args: ErasedArgs);
}

impl<Args: SlotArgs, R: Send + 'static> AnySlot for Slot<Args, R> {
    fn id(&self) -> SlotId {
        Slot::id(self)
    }

    fn signature(&self) -> &Signature {
        Slot::signature(self)
    }

    fn num_connections(&self) -> usize {
        Slot::num_connections(self)
    }

    fn link(&self) -> SlotLink {
        Slot::link(self)
    }

    fn set_worker(&self, worker: Option<&Worker>) {
        match worker {
            Some(worker) => Slot::set_worker(self, worker),
            None => self.clear_worker(),
        }
    }

    fn run_erased(&self, args: &ErasedArgs) {
        match Args::from_erased(args) {
            Some(args) => {
                self.run(&args);
            }
            None => log_rejected(self.inner.id, &self.inner.signature, args),
        }
    }

    fn dispatch_erased(&self, args: ErasedArgs) {
        match Args::from_erased(&args) {
            Some(args) => self.dispatch(args),
            None => log_rejected(self.inner.id, &self.inner.signature, &args),
        }
    }
}

fn log_rejected(id: SlotId, signature: &Signature, args: &ErasedArgs) {
    tracing::warn!(
        target: targets::SLOT,
        slot = %id,
        %signature,
        received = args.len(),
        "erased arguments do not match slot signature"
    );
}

/// A slot with its argument types erased.
///
/// This is the form in which the [`Proxy`](crate::Proxy) and the keyed
/// [`Slots`](crate::Slots) map hold slots of different types side by side.
#[derive(Clone)]
pub struct ErasedSlot {
    inner: Arc<dyn AnySlot>,
}

impl ErasedSlot {
    /// The slot's identity.
    pub fn id(&self) -> SlotId {
        self.inner.id()
    }

    /// The argument signature the slot receives.
    pub fn signature(&self) -> &Signature {
        self.inner.signature()
    }

    /// Number of live connections referencing this slot.
    pub fn num_connections(&self) -> usize {
        self.inner.num_connections()
    }

    /// Bind every clone of the slot to `worker`.
    pub fn set_worker(&self, worker: &Worker) {
        self.inner.set_worker(Some(worker));
    }

    /// Remove the worker binding.
    pub fn clear_worker(&self) {
        self.inner.set_worker(None);
    }

    pub(crate) fn link(&self) -> SlotLink {
        self.inner.link()
    }

    pub(crate) fn run(&self, args: &ErasedArgs) {
        self.inner.run_erased(args);
    }

    pub(crate) fn dispatch(&self, args: ErasedArgs) {
        self.inner.dispatch_erased(args);
    }
}

impl<Args: SlotArgs, R: Send + 'static> From<&Slot<Args, R>> for ErasedSlot {
    fn from(slot: &Slot<Args, R>) -> Self {
        Self {
            inner: Arc::new(slot.clone()),
        }
    }
}

impl<Args: SlotArgs, R: Send + 'static> From<Slot<Args, R>> for ErasedSlot {
    fn from(slot: Slot<Args, R>) -> Self {
        Self {
            inner: Arc::new(slot),
        }
    }
}

impl From<&ErasedSlot> for ErasedSlot {
    fn from(slot: &ErasedSlot) -> Self {
        slot.clone()
    }
}

impl fmt::Debug for ErasedSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedSlot")
            .field("id", &self.id())
            .field("signature", self.signature())
            .field("num_connections", &self.num_connections())
            .finish()
    }
}

static_assertions::assert_impl_all!(Slot<(i32,)>: Send, Sync);
static_assertions::assert_impl_all!(ErasedSlot: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::thread;

    #[test]
    fn test_run_and_call() {
        let slot = Slot::new(|&(a, b): &(i32, i32)| a * b);
        assert_eq!(slot.run(&(3, 4)), 12);
        assert_eq!(slot.call((5, 6)), 30);
    }

    #[test]
    fn test_clones_share_identity() {
        let slot = Slot::new(|_: &()| {});
        let clone = slot.clone();
        assert_eq!(slot.id(), clone.id());
        assert_ne!(slot.id(), Slot::new(|_: &()| {}).id());

        let _link = clone.link();
        assert_eq!(slot.num_connections(), 1);
    }

    #[test]
    fn test_link_counts() {
        let slot = Slot::new(|_: &(i32,)| {});
        let first = slot.link();
        let second = slot.link();
        assert_eq!(slot.num_connections(), 2);
        drop(first);
        assert_eq!(slot.num_connections(), 1);
        drop(second);
        assert_eq!(slot.num_connections(), 0);
    }

    #[test]
    fn test_post_without_worker() {
        let slot = Slot::new(|_: &(i32,)| {});
        assert_eq!(slot.post((1,)), Err(SlotError::NoWorker));
        assert!(matches!(slot.async_call((1,)), Err(SlotError::NoWorker)));
    }

    #[test]
    fn test_post_runs_on_worker_thread() {
        let worker = Worker::new().unwrap();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let slot = Slot::with_worker(
            move |&(n,): &(i32,)| {
                sender.send((n, thread::current().id())).unwrap();
            },
            &worker,
        );

        slot.post((7,)).unwrap();
        let (value, thread_id) = receiver.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(thread_id, worker.thread_id());
        worker.stop();
    }

    #[test]
    fn test_post_to_stopped_worker() {
        let worker = Worker::new().unwrap();
        let slot = Slot::with_worker(|_: &()| {}, &worker);
        worker.stop();
        assert_eq!(
            slot.post(()),
            Err(SlotError::Worker(crate::error::WorkerError::Stopped))
        );
    }

    #[test]
    fn test_async_call_result() {
        let worker = Worker::new().unwrap();
        let slot = Slot::with_worker(|s: &(String,)| s.0.len(), &worker);

        let pending = slot.async_call(("hello".to_string(),)).unwrap();
        assert_eq!(pending.wait_timeout(Duration::from_secs(1)), Some(5));
        worker.stop();
    }

    #[test]
    fn test_async_call_panic_yields_none() {
        let worker = Worker::new().unwrap();
        let slot = Slot::with_worker(|_: &()| -> i32 { panic!("boom") }, &worker);

        let pending = slot.async_call(()).unwrap();
        assert_eq!(pending.wait(), None);
        assert!(worker.is_running());
        worker.stop();
    }

    #[test]
    fn test_rebind_worker() {
        let first = Worker::new().unwrap();
        let second = Worker::new().unwrap();
        let slot = Slot::with_worker(|_: &()| thread::current().id(), &first);

        assert_eq!(slot.async_call(()).unwrap().wait(), Some(first.thread_id()));
        slot.set_worker(&second);
        assert_eq!(slot.async_call(()).unwrap().wait(), Some(second.thread_id()));
        slot.clear_worker();
        assert!(slot.worker().is_none());
    }

    #[test]
    fn test_dispatch_without_worker_runs_inline() {
        let caller = thread::current().id();
        let ran_on = Arc::new(parking_lot::Mutex::new(None));
        let ran_on_clone = ran_on.clone();
        let slot = Slot::new(move |_: &()| {
            *ran_on_clone.lock() = Some(thread::current().id());
        });

        slot.dispatch(());
        assert_eq!(*ran_on.lock(), Some(caller));
    }

    #[test]
    fn test_tracked_slot() {
        let target = Arc::new(AtomicI32::new(10));
        let slot = Slot::tracked(&target, |value, &(n,): &(i32,)| {
            value.fetch_add(n, Ordering::SeqCst) + n
        });

        assert_eq!(slot.run(&(5,)), Some(15));
        drop(target);
        assert_eq!(slot.run(&(5,)), None);
    }

    #[test]
    fn test_erased_slot_runs_prefix() {
        let total = Arc::new(AtomicI32::new(0));
        let total_clone = total.clone();
        let slot = Slot::new(move |&(a, b): &(i32, i32)| {
            total_clone.fetch_add(a + b, Ordering::SeqCst);
        });
        let erased = ErasedSlot::from(&slot);
        assert_eq!(erased.id(), slot.id());

        erased.run(&(8, 2, 'x').into_erased());
        assert_eq!(total.load(Ordering::SeqCst), 10);

        // Mismatched arguments are rejected without invoking.
        erased.run(&(1,).into_erased());
        assert_eq!(total.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_erased_set_worker() {
        let worker = Worker::new().unwrap();
        let slot = Slot::new(|_: &()| {});
        let erased = ErasedSlot::from(&slot);

        erased.set_worker(&worker);
        assert_eq!(slot.worker().map(|w| w.thread_id()), Some(worker.thread_id()));
        erased.clear_worker();
        assert!(slot.worker().is_none());
    }
}
