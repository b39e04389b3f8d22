//! Handles to live signal/slot connections.
//!
//! A [`Connection`] is returned by every successful connect. It can be used
//! to disconnect or temporarily block delivery from either side, and stays
//! valid (as a disconnected handle) after the signal is gone.
//!
//! # Connection States
//!
//! - **Active**: emissions are delivered
//! - **Blocked**: emissions skip this connection until unblocked
//! - **Disconnected**: terminal; reached through [`Connection::disconnect`],
//!   `Signal::disconnect`, or dropping the last signal handle
//!
//! # Example
//!
//! ```
//! use sight_com::{Signal, Slot};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! let signal = Signal::<(i32,)>::new();
//! let total = Arc::new(AtomicI32::new(0));
//! let total_clone = total.clone();
//! let slot = Slot::new(move |&(n,): &(i32,)| {
//!     total_clone.fetch_add(n, Ordering::SeqCst);
//! });
//!
//! let connection = signal.connect(&slot);
//! {
//!     let _blocker = connection.block();
//!     signal.emit((1,)); // Suppressed
//! }
//! signal.emit((2,));
//! assert_eq!(total.load(Ordering::SeqCst), 2);
//!
//! connection.disconnect();
//! assert_eq!(slot.num_connections(), 0);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use slotmap::new_key_type;

new_key_type! {
    /// A unique identifier for a signal-slot connection within one signal.
    pub struct ConnectionId;
}

/// Flags shared between a signal's connection entry and its handles.
#[derive(Debug)]
pub(crate) struct ConnectionState {
    connected: AtomicBool,
    blocked: AtomicBool,
}

impl ConnectionState {
    pub(crate) fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            blocked: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

/// The side of a connection that stores it.
pub(crate) trait ConnectionOwner: Send + Sync {
    /// Remove a connection, returning whether it was present.
    fn remove_connection(&self, id: ConnectionId) -> bool;
}

/// A handle to one signal-to-slot connection.
///
/// Cloning produces another handle to the same connection. Dropping a
/// handle does not disconnect; see [`ConnectionGuard`] for that.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    owner: Weak<dyn ConnectionOwner>,
    state: Arc<ConnectionState>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        owner: Weak<dyn ConnectionOwner>,
        state: Arc<ConnectionState>,
    ) -> Self {
        Self { id, owner, state }
    }

    /// The connection's identifier within its signal.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Disconnect the slot from the signal.
    ///
    /// Idempotent: returns `true` only for the call that disconnected.
    /// Invocations already queued on a worker still run.
    pub fn disconnect(&self) -> bool {
        if !self.state.connected.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.remove_connection(self.id);
        }
        true
    }

    /// Whether the connection is still live.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Whether delivery through this connection is currently suppressed.
    pub fn is_blocked(&self) -> bool {
        self.state.is_blocked()
    }

    /// Suppress or resume delivery through this connection.
    pub fn set_blocked(&self, blocked: bool) {
        self.state.blocked.store(blocked, Ordering::Release);
    }

    /// Block delivery until the returned guard is dropped.
    pub fn block(&self) -> Blocker {
        Blocker::new(self)
    }

    /// Wrap the connection in a guard that disconnects on drop.
    pub fn into_guard(self) -> ConnectionGuard {
        ConnectionGuard { connection: self }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// Scoped suppression of one connection.
///
/// Sets the connection's blocked flag on construction and restores the
/// previous value on drop, so nested blockers unwind correctly. Typical use
/// is a slot that modifies the object whose signal triggered it.
#[must_use = "the connection is unblocked as soon as the Blocker is dropped"]
pub struct Blocker {
    state: Arc<ConnectionState>,
    previous: bool,
}

impl Blocker {
    /// Block `connection` for the lifetime of the returned guard.
    pub fn new(connection: &Connection) -> Self {
        let previous = connection.state.blocked.swap(true, Ordering::AcqRel);
        Self {
            state: connection.state.clone(),
            previous,
        }
    }
}

impl Drop for Blocker {
    fn drop(&mut self) {
        self.state.blocked.store(self.previous, Ordering::Release);
    }
}

/// A connection that disconnects when dropped.
///
/// Created via [`Connection::into_guard`] or
/// [`Signal::connect_scoped`](crate::Signal::connect_scoped).
#[must_use = "the connection is disconnected as soon as the guard is dropped"]
pub struct ConnectionGuard {
    connection: Connection,
}

impl ConnectionGuard {
    /// The guarded connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}

/// A set of connections released together.
///
/// Services fill it while starting and drop or clear it when stopping.
#[derive(Default)]
pub struct Connections {
    connections: Vec<Connection>,
}

impl Connections {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection.
    pub fn push(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Number of tracked connections, live or not.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Disconnect and forget every tracked connection.
    pub fn disconnect_all(&mut self) {
        for connection in self.connections.drain(..) {
            connection.disconnect();
        }
    }
}

impl Extend<Connection> for Connections {
    fn extend<I: IntoIterator<Item = Connection>>(&mut self, iter: I) {
        self.connections.extend(iter);
    }
}

impl Drop for Connections {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
