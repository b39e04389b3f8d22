//! Signals: typed multi-subscriber event sources.
//!
//! A [`Signal<Args>`] keeps an ordered table of connections to [`Slot`]s
//! receiving the same argument tuple. Emitting delivers the arguments to
//! every connection that is not blocked.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The event source
//! - [`Connection`] - Handle returned by [`Signal::connect`]
//! - [`ErasedSignal`] - A signal with its argument types erased, used by the
//!   [`Proxy`](crate::Proxy)
//!
//! # Delivery
//!
//! - [`Signal::emit`] runs every slot on the emitting thread, in connection
//!   order, before returning
//! - [`Signal::async_emit`] hands the arguments to each slot's worker and
//!   returns at once; slots without a worker run inline
//!
//! Both snapshot the connection table and release its lock before calling
//! any slot, so slots may connect or disconnect while being invoked.
//!
//! # Example
//!
//! ```
//! use sight_com::{Signal, Slot};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! let modified = Signal::<(i32, i32)>::new();
//! let total = Arc::new(AtomicI32::new(0));
//! let total_clone = total.clone();
//! let sum = Slot::new(move |&(a, b): &(i32, i32)| {
//!     total_clone.fetch_add(a + b, Ordering::SeqCst);
//! });
//!
//! modified.connect(&sum);
//! modified.emit((3, 5));
//! assert_eq!(total.load(Ordering::SeqCst), 8);
//!
//! modified.disconnect(&sum);
//! assert_eq!(sum.num_connections(), 0);
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::args::{Signature, SlotArgs};
use crate::connection::{
    Connection, ConnectionGuard, ConnectionId, ConnectionOwner, ConnectionState,
};
use crate::error::SignalError;
use crate::logging::{panic_message, targets};
use crate::slot::{ErasedSlot, Slot, SlotId, SlotLink};

static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a signal, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    fn next() -> Self {
        Self(NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery of one argument tuple to one connected slot.
trait Invoker<Args>: Send + Sync {
    fn invoke(&self, args: &Args);
    fn dispatch(&self, args: Args);
}

impl<Args: SlotArgs, R: Send + 'static> Invoker<Args> for Slot<Args, R> {
    fn invoke(&self, args: &Args) {
        self.run(args);
    }

    fn dispatch(&self, args: Args) {
        Slot::dispatch(self, args);
    }
}

/// Delivers to a slot whose signature is a checked prefix of `Args`.
struct ErasedInvoker(ErasedSlot);

impl<Args: SlotArgs> Invoker<Args> for ErasedInvoker {
    fn invoke(&self, args: &Args) {
        self.0.run(&args.clone().into_erased());
    }

    fn dispatch(&self, args: Args) {
        self.0.dispatch(args.into_erased());
    }
}

struct ConnectionEntry<Args> {
    slot_id: SlotId,
    invoker: Arc<dyn Invoker<Args>>,
    state: Arc<ConnectionState>,
    _link: SlotLink,
}

impl<Args> Drop for ConnectionEntry<Args> {
    fn drop(&mut self) {
        self.state.mark_disconnected();
    }
}

struct ConnectionTable<Args> {
    entries: SlotMap<ConnectionId, ConnectionEntry<Args>>,
    order: Vec<ConnectionId>,
}

impl<Args> ConnectionTable<Args> {
    fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    fn find(&self, slot_id: SlotId) -> Option<ConnectionId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.entries.get(*id).is_some_and(|entry| entry.slot_id == slot_id))
    }

    fn remove(&mut self, id: ConnectionId) -> Option<ConnectionEntry<Args>> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|other| *other != id);
        Some(entry)
    }
}

struct SignalInner<Args> {
    id: SignalId,
    table: Mutex<ConnectionTable<Args>>,
    blocked: AtomicBool,
    signature: Signature,
}

impl<Args: SlotArgs> ConnectionOwner for SignalInner<Args> {
    fn remove_connection(&self, id: ConnectionId) -> bool {
        let entry = self.table.lock().remove(id);
        // Dropped outside the lock: the entry may own the last slot handle.
        entry.is_some()
    }
}

/// A typed, multi-subscriber event source.
///
/// `Args` is the argument tuple passed to connected slots: `()` for no
/// arguments, `(T,)` for one, `(A, B)` for two and so on.
///
/// Cloning is cheap; clones share the connection table. When the last clone
/// is dropped every connection is released.
pub struct Signal<Args: SlotArgs> {
    inner: Arc<SignalInner<Args>>,
}

impl<Args: SlotArgs> Clone for Signal<Args> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Args: SlotArgs> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: SlotArgs> Signal<Args> {
    /// Create a signal without connections.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::next(),
                table: Mutex::new(ConnectionTable::new()),
                blocked: AtomicBool::new(false),
                signature: Args::signature(),
            }),
        }
    }

    /// The signal's identity.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// The argument signature the signal emits.
    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Connect `slot`.
    ///
    /// Connecting a slot that is already connected returns the existing
    /// connection without touching any counter.
    pub fn connect<R: Send + 'static>(&self, slot: &Slot<Args, R>) -> Connection {
        self.attach(slot.id(), || {
            let invoker: Arc<dyn Invoker<Args>> = Arc::new(slot.clone());
            (invoker, slot.link())
        })
    }

    /// Connect a closure through an anonymous slot.
    pub fn connect_fn<F>(&self, function: F) -> Connection
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connect(&Slot::new(function))
    }

    /// Connect `slot` for as long as the returned guard lives.
    pub fn connect_scoped<R: Send + 'static>(&self, slot: &Slot<Args, R>) -> ConnectionGuard {
        self.connect(slot).into_guard()
    }

    /// Connect a slot whose types are only known at runtime.
    ///
    /// The slot must accept this signal's signature: its arguments must be
    /// an identical prefix of the emitted ones.
    pub fn connect_erased(&self, slot: &ErasedSlot) -> Result<Connection, SignalError> {
        if !slot.signature().accepts(self.signature()) {
            return Err(SignalError::IncompatibleSignature {
                signal: self.signature().to_string(),
                slot: slot.signature().to_string(),
            });
        }
        Ok(self.attach(slot.id(), || {
            let invoker: Arc<dyn Invoker<Args>> = Arc::new(ErasedInvoker(slot.clone()));
            (invoker, slot.link())
        }))
    }

    fn attach<F>(&self, slot_id: SlotId, make: F) -> Connection
    where
        F: FnOnce() -> (Arc<dyn Invoker<Args>>, SlotLink),
    {
        let mut table = self.inner.table.lock();
        if let Some(id) = table.find(slot_id) {
            let state = table.entries[id].state.clone();
            return self.handle(id, state);
        }

        let (invoker, link) = make();
        let state = Arc::new(ConnectionState::new());
        let id = table.entries.insert(ConnectionEntry {
            slot_id,
            invoker,
            state: state.clone(),
            _link: link,
        });
        table.order.push(id);
        let count = table.order.len();
        drop(table);

        tracing::trace!(
            target: targets::SIGNAL,
            signal = %self.inner.id,
            slot = %slot_id,
            connections = count,
            "slot connected"
        );
        self.handle(id, state)
    }

    fn handle(&self, id: ConnectionId, state: Arc<ConnectionState>) -> Connection {
        let inner: Weak<SignalInner<Args>> = Arc::downgrade(&self.inner);
        let owner: Weak<dyn ConnectionOwner> = inner;
        Connection::new(id, owner, state)
    }

    /// Disconnect `slot`. Returns `false` if it was not connected.
    pub fn disconnect<R>(&self, slot: &Slot<Args, R>) -> bool {
        self.disconnect_id(slot.id())
    }

    pub(crate) fn disconnect_id(&self, slot_id: SlotId) -> bool {
        let entry = {
            let mut table = self.inner.table.lock();
            table.find(slot_id).and_then(|id| table.remove(id))
        };
        entry.is_some()
    }

    /// Disconnect every slot.
    pub fn disconnect_all(&self) {
        let entries = {
            let mut table = self.inner.table.lock();
            table.order.clear();
            std::mem::take(&mut table.entries)
        };
        tracing::trace!(
            target: targets::SIGNAL,
            signal = %self.inner.id,
            released = entries.len(),
            "all slots disconnected"
        );
    }

    /// Number of connected slots.
    pub fn num_connections(&self) -> usize {
        self.inner.table.lock().order.len()
    }

    /// Whether `slot` is connected to this signal.
    pub fn is_connected<R>(&self, slot: &Slot<Args, R>) -> bool {
        self.inner.table.lock().find(slot.id()).is_some()
    }

    /// Suppress or resume delivery to every connection.
    pub fn set_blocked(&self, blocked: bool) {
        self.inner.blocked.store(blocked, Ordering::Release);
    }

    /// Whether the whole signal is blocked.
    pub fn is_blocked(&self) -> bool {
        self.inner.blocked.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> Vec<(SlotId, Arc<dyn Invoker<Args>>)> {
        let table = self.inner.table.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.entries.get(*id))
            .filter(|entry| !entry.state.is_blocked())
            .map(|entry| (entry.slot_id, entry.invoker.clone()))
            .collect()
    }

    /// Invoke every unblocked slot on the current thread.
    ///
    /// Slots run in connection order. A panicking slot is logged and does
    /// not stop delivery to the remaining ones.
    #[tracing::instrument(
        skip_all,
        target = "sight_com::signal",
        level = "trace",
        fields(signal = %self.inner.id)
    )]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let invokers = self.snapshot();
        tracing::trace!(
            target: targets::SIGNAL,
            connection_count = invokers.len(),
            "emitting signal"
        );

        for (slot_id, invoker) in invokers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| invoker.invoke(&args)));
            if let Err(payload) = result {
                tracing::error!(
                    target: targets::SIGNAL,
                    slot = %slot_id,
                    "slot panicked during emit: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    /// Hand the arguments to every unblocked slot's worker and return.
    ///
    /// Slots without a worker run inline. Returns the number of slots the
    /// call was delivered or queued to.
    #[tracing::instrument(
        skip_all,
        target = "sight_com::signal",
        level = "trace",
        fields(signal = %self.inner.id)
    )]
    pub fn async_emit(&self, args: Args) -> usize {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping async emit");
            return 0;
        }

        let invokers = self.snapshot();
        tracing::trace!(
            target: targets::SIGNAL,
            connection_count = invokers.len(),
            "posting signal"
        );

        let count = invokers.len();
        for (slot_id, invoker) in invokers {
            let call = args.clone();
            let result = panic::catch_unwind(AssertUnwindSafe(|| invoker.dispatch(call)));
            if let Err(payload) = result {
                tracing::error!(
                    target: targets::SIGNAL,
                    slot = %slot_id,
                    "slot panicked during inline async emit: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
        count
    }
}

impl<Args: SlotArgs> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("signature", &self.inner.signature)
            .field("num_connections", &self.num_connections())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// Object-safe view of a signal whose argument types are only known at runtime.
pub(crate) trait AnySignal: Send + Sync {
    fn id(&self) -> SignalId;
    fn signature(&self) -> &Signature;
    fn num_connections(&self) -> usize;
    fn connect_erased(&self, slot: &ErasedSlot) -> Result<Connection, SignalError>;
    fn disconnect_slot(&self, slot: SlotId) -> bool;
}

impl<Args: SlotArgs> AnySignal for Signal<Args> {
    fn id(&self) -> SignalId {
        Signal::id(self)
    }

    fn signature(&self) -> &Signature {
        Signal::signature(self)
    }

    fn num_connections(&self) -> usize {
        Signal::num_connections(self)
    }

    fn connect_erased(&self, slot: &ErasedSlot) -> Result<Connection, SignalError> {
        Signal::connect_erased(self, slot)
    }

    fn disconnect_slot(&self, slot: SlotId) -> bool {
        self.disconnect_id(slot)
    }
}

/// A signal with its argument types erased.
///
/// Holds a strong handle: the signal stays alive while an `ErasedSignal`
/// of it exists.
#[derive(Clone)]
pub struct ErasedSignal {
    inner: Arc<dyn AnySignal>,
}

impl ErasedSignal {
    /// The signal's identity.
    pub fn id(&self) -> SignalId {
        self.inner.id()
    }

    /// The argument signature the signal emits.
    pub fn signature(&self) -> &Signature {
        self.inner.signature()
    }

    /// Number of connected slots.
    pub fn num_connections(&self) -> usize {
        self.inner.num_connections()
    }

    /// Connect `slot` if it accepts this signal's signature.
    pub fn connect(&self, slot: &ErasedSlot) -> Result<Connection, SignalError> {
        self.inner.connect_erased(slot)
    }

    /// Disconnect `slot`. Returns `false` if it was not connected.
    pub fn disconnect(&self, slot: &ErasedSlot) -> bool {
        self.inner.disconnect_slot(slot.id())
    }
}

impl<Args: SlotArgs> From<&Signal<Args>> for ErasedSignal {
    fn from(signal: &Signal<Args>) -> Self {
        Self {
            inner: Arc::new(signal.clone()),
        }
    }
}

impl<Args: SlotArgs> From<Signal<Args>> for ErasedSignal {
    fn from(signal: Signal<Args>) -> Self {
        Self {
            inner: Arc::new(signal),
        }
    }
}

impl From<&ErasedSignal> for ErasedSignal {
    fn from(signal: &ErasedSignal) -> Self {
        signal.clone()
    }
}

impl fmt::Debug for ErasedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedSignal")
            .field("id", &self.id())
            .field("signature", self.signature())
            .field("num_connections", &self.num_connections())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signal<(i32, String)>: Send, Sync);
static_assertions::assert_impl_all!(ErasedSignal: Send, Sync);
