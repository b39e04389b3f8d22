//! Named channels connecting signals and slots that never see each other.
//!
//! A [`Proxy`] maps channel names to the signals and slots registered under
//! them. Registering a member connects it to every compatible counterpart
//! already on the channel, and to every compatible counterpart added later.
//! Pairs whose signatures do not match are skipped without an error, so
//! independently configured components cannot break each other by sharing
//! a channel name.
//!
//! # Compatibility
//!
//! A slot taking `N` arguments is connected to a signal emitting `M >= N`
//! arguments when the first `N` types are identical. The extra arguments
//! are dropped on delivery.
//!
//! # Example
//!
//! ```
//! use sight_com::{Proxy, Signal, Slot};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! let proxy = Proxy::new();
//! let total = Arc::new(AtomicI32::new(0));
//! let total_clone = total.clone();
//! let sum = Slot::new(move |&(a, b): &(i32, i32)| {
//!     total_clone.fetch_add(a + b, Ordering::SeqCst);
//! });
//! let picked = Signal::<(i32, i32, char)>::new();
//!
//! proxy.connect_slot("channel1", &sum);
//! assert_eq!(proxy.connect_signal("channel1", &picked), 1);
//!
//! picked.emit((8, 2, 'x'));
//! assert_eq!(total.load(Ordering::SeqCst), 10);
//!
//! proxy.disconnect_signal("channel1", &picked);
//! proxy.disconnect_slot("channel1", &sum);
//! assert_eq!(sum.num_connections(), 0);
//! assert!(!proxy.has_channel("channel1"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::args::Signature;
use crate::connection::Connection;
use crate::error::ProxyError;
use crate::logging::targets;
use crate::registry::{HasSignals, HasSlots};
use crate::signal::{ErasedSignal, SignalId};
use crate::slot::{ErasedSlot, SlotId};

static GLOBAL_PROXY: Mutex<Option<Arc<Proxy>>> = Mutex::new(None);

type PairKey = (SignalId, SlotId);

struct ChannelSignal {
    signal: ErasedSignal,
    /// Slots this signal is paired with through the channel.
    paired: Vec<SlotId>,
}

#[derive(Default)]
struct Channel {
    signals: Vec<ChannelSignal>,
    slots: Vec<ErasedSlot>,
}

impl Channel {
    fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.slots.is_empty()
    }

    fn pair_keys(&self) -> Vec<PairKey> {
        self.signals
            .iter()
            .flat_map(|member| {
                let signal = member.signal.id();
                member.paired.iter().map(move |slot| (signal, *slot))
            })
            .collect()
    }
}

/// A signal/slot connection shared by every channel pairing the two.
struct SharedPair {
    connection: Connection,
    channels: usize,
}

/// Connections made by the proxy, keyed by the pair they join.
#[derive(Default)]
struct Pairs(HashMap<PairKey, SharedPair>);

impl Pairs {
    /// Take one channel's reference on the pair, connecting it if needed.
    fn acquire(&mut self, channel: &str, signal: &ErasedSignal, slot: &ErasedSlot) -> bool {
        let key = (signal.id(), slot.id());
        if let Some(shared) = self.0.get_mut(&key) {
            if !shared.connection.is_connected() {
                match pair(channel, signal, slot) {
                    Some(connection) => shared.connection = connection,
                    None => return false,
                }
            }
            shared.channels += 1;
            return true;
        }
        match pair(channel, signal, slot) {
            Some(connection) => {
                self.0.insert(key, SharedPair { connection, channels: 1 });
                true
            }
            None => false,
        }
    }

    /// Drop one channel's reference on each pair. Returns the connections
    /// no channel holds anymore.
    fn release(&mut self, keys: impl IntoIterator<Item = PairKey>) -> Vec<Connection> {
        let mut released = Vec::new();
        for key in keys {
            let Some(shared) = self.0.get_mut(&key) else {
                continue;
            };
            shared.channels -= 1;
            if shared.channels == 0 {
                if let Some(shared) = self.0.remove(&key) {
                    released.push(shared.connection);
                }
            }
        }
        released
    }

    fn is_live(&self, key: &PairKey) -> bool {
        self.0
            .get(key)
            .is_some_and(|shared| shared.connection.is_connected())
    }

    fn drain(&mut self) -> Vec<Connection> {
        self.0.drain().map(|(_, shared)| shared.connection).collect()
    }
}

#[derive(Default)]
struct ProxyState {
    channels: HashMap<String, Channel>,
    pairs: Pairs,
}

/// Pair `signal` with `slot`, or log why the pair was skipped.
fn pair(channel: &str, signal: &ErasedSignal, slot: &ErasedSlot) -> Option<Connection> {
    match signal.connect(slot) {
        Ok(connection) => Some(connection),
        Err(error) => {
            tracing::debug!(
                target: targets::PROXY,
                channel,
                signal = %signal.id(),
                slot = %slot.id(),
                %error,
                "skipping incompatible pair"
            );
            None
        }
    }
}

fn disconnect_all(connections: Vec<Connection>) {
    for connection in connections {
        connection.disconnect();
    }
}

/// A registry of named signal/slot channels.
///
/// Members are held by strong handles until they are disconnected from the
/// channel, the channel is cleared, or the proxy is dropped. A signal and a
/// slot that share several channels are connected once; the connection
/// stays until the last of those channels stops pairing them.
#[derive(Default)]
pub struct Proxy {
    state: RwLock<ProxyState>,
}

impl Proxy {
    /// Create an empty, standalone proxy.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide proxy, created on first use.
    pub fn global() -> Arc<Proxy> {
        GLOBAL_PROXY
            .lock()
            .get_or_insert_with(|| Arc::new(Proxy::new()))
            .clone()
    }

    /// Disconnect everything on the process-wide proxy and drop it.
    ///
    /// A later call to [`Proxy::global`] creates a fresh instance.
    pub fn shutdown_global() {
        let proxy = GLOBAL_PROXY.lock().take();
        if let Some(proxy) = proxy {
            proxy.clear();
            tracing::debug!(target: targets::CORE, "global proxy shut down");
        }
    }

    /// Register `signal` on `channel`.
    ///
    /// Returns the number of slots it was connected to. Registering a
    /// signal twice on the same channel does nothing and returns 0.
    pub fn connect_signal(&self, channel: &str, signal: impl Into<ErasedSignal>) -> usize {
        let signal = signal.into();
        let mut guard = self.state.write();
        let state = &mut *guard;
        let entry = state.channels.entry(channel.to_string()).or_default();
        if entry.signals.iter().any(|member| member.signal.id() == signal.id()) {
            return 0;
        }

        let mut paired = Vec::new();
        for slot in &entry.slots {
            if state.pairs.acquire(channel, &signal, slot) {
                paired.push(slot.id());
            }
        }
        let count = paired.len();
        entry.signals.push(ChannelSignal { signal, paired });

        tracing::debug!(target: targets::PROXY, channel, connections = count, "signal registered");
        count
    }

    /// Register `slot` on `channel`.
    ///
    /// Returns the number of signals it was connected to. Registering a
    /// slot twice on the same channel does nothing and returns 0.
    pub fn connect_slot(&self, channel: &str, slot: impl Into<ErasedSlot>) -> usize {
        let slot = slot.into();
        let mut guard = self.state.write();
        let state = &mut *guard;
        let entry = state.channels.entry(channel.to_string()).or_default();
        if entry.slots.iter().any(|member| member.id() == slot.id()) {
            return 0;
        }

        let mut count = 0;
        for member in &mut entry.signals {
            if state.pairs.acquire(channel, &member.signal, &slot) {
                member.paired.push(slot.id());
                count += 1;
            }
        }
        entry.slots.push(slot);

        tracing::debug!(target: targets::PROXY, channel, connections = count, "slot registered");
        count
    }

    /// Remove `signal` from `channel` and tear down its connections there.
    ///
    /// Pairs the signal still has through another channel stay connected.
    /// Returns `false` if it was not registered on the channel.
    pub fn disconnect_signal(&self, channel: &str, signal: impl Into<ErasedSignal>) -> bool {
        let id = signal.into().id();
        let (removed, released) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let Some(entry) = state.channels.get_mut(channel) else {
                return false;
            };
            let Some(index) = entry.signals.iter().position(|member| member.signal.id() == id)
            else {
                return false;
            };
            let removed = entry.signals.remove(index);
            if entry.is_empty() {
                state.channels.remove(channel);
            }
            let released = state
                .pairs
                .release(removed.paired.iter().map(|slot| (id, *slot)));
            (removed, released)
        };

        // Handles are released outside the lock.
        disconnect_all(released);
        drop(removed);
        tracing::debug!(target: targets::PROXY, channel, signal = %id, "signal unregistered");
        true
    }

    /// Remove `slot` from `channel` and tear down its connections there.
    ///
    /// Pairs the slot still has through another channel stay connected.
    /// Returns `false` if it was not registered on the channel.
    pub fn disconnect_slot(&self, channel: &str, slot: impl Into<ErasedSlot>) -> bool {
        let id = slot.into().id();
        let (removed, released) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let Some(entry) = state.channels.get_mut(channel) else {
                return false;
            };
            let Some(index) = entry.slots.iter().position(|member| member.id() == id) else {
                return false;
            };
            let removed = entry.slots.remove(index);

            let mut keys = Vec::new();
            for member in &mut entry.signals {
                let before = member.paired.len();
                member.paired.retain(|slot| *slot != id);
                if member.paired.len() != before {
                    keys.push((member.signal.id(), id));
                }
            }
            if entry.is_empty() {
                state.channels.remove(channel);
            }
            (removed, state.pairs.release(keys))
        };

        disconnect_all(released);
        drop(removed);
        tracing::debug!(target: targets::PROXY, channel, slot = %id, "slot unregistered");
        true
    }
    /// Register the signal `key` of `owner` on `channel`.
    pub fn connect_signal_key(
        &self,
        channel: &str,
        owner: &impl HasSignals,
        key: &str,
    ) -> Result<usize, ProxyError> {
        let signal = owner
            .signals()
            .erased(key)
            .ok_or_else(|| ProxyError::UnknownSignal(key.to_string()))?;
        Ok(self.connect_signal(channel, signal))
    }

    /// Register the slot `key` of `owner` on `channel`.
    pub fn connect_slot_key(
        &self,
        channel: &str,
        owner: &impl HasSlots,
        key: &str,
    ) -> Result<usize, ProxyError> {
        let slot = owner
            .slots()
            .erased(key)
            .ok_or_else(|| ProxyError::UnknownSlot(key.to_string()))?;
        Ok(self.connect_slot(channel, slot))
    }

    /// Remove the signal `key` of `owner` from `channel`.
    pub fn disconnect_signal_key(
        &self,
        channel: &str,
        owner: &impl HasSignals,
        key: &str,
    ) -> Result<bool, ProxyError> {
        let signal = owner
            .signals()
            .erased(key)
            .ok_or_else(|| ProxyError::UnknownSignal(key.to_string()))?;
        Ok(self.disconnect_signal(channel, signal))
    }

    /// Remove the slot `key` of `owner` from `channel`.
    pub fn disconnect_slot_key(
        &self,
        channel: &str,
        owner: &impl HasSlots,
        key: &str,
    ) -> Result<bool, ProxyError> {
        let slot = owner
            .slots()
            .erased(key)
            .ok_or_else(|| ProxyError::UnknownSlot(key.to_string()))?;
        Ok(self.disconnect_slot(channel, slot))
    }

    /// Names of all channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether `channel` has any member.
    pub fn has_channel(&self, channel: &str) -> bool {
        self.state.read().channels.contains_key(channel)
    }

    /// Number of signals registered on `channel`.
    pub fn signal_count(&self, channel: &str) -> usize {
        self.state
            .read()
            .channels
            .get(channel)
            .map_or(0, |entry| entry.signals.len())
    }

    /// Number of slots registered on `channel`.
    pub fn slot_count(&self, channel: &str) -> usize {
        self.state
            .read()
            .channels
            .get(channel)
            .map_or(0, |entry| entry.slots.len())
    }

    /// Remove every member of `channel`. Returns `false` if it did not exist.
    pub fn disconnect_channel(&self, channel: &str) -> bool {
        let (removed, released) = {
            let mut state = self.state.write();
            let Some(entry) = state.channels.remove(channel) else {
                return false;
            };
            let released = state.pairs.release(entry.pair_keys());
            (entry, released)
        };

        disconnect_all(released);
        drop(removed);
        tracing::debug!(target: targets::PROXY, channel, "channel removed");
        true
    }

    /// Remove every channel.
    pub fn clear(&self) {
        let mut state = std::mem::take(&mut *self.state.write());
        if state.channels.is_empty() {
            return;
        }
        let count = state.channels.len();
        disconnect_all(state.pairs.drain());
        drop(state);
        tracing::debug!(target: targets::PROXY, channels = count, "proxy cleared");
    }

    /// A point-in-time description of every channel, sorted by name.
    pub fn snapshot(&self) -> Vec<ChannelInfo> {
        let state = self.state.read();
        let mut infos: Vec<ChannelInfo> = state
            .channels
            .iter()
            .map(|(name, entry)| ChannelInfo {
                name: name.clone(),
                signals: entry
                    .signals
                    .iter()
                    .map(|member| MemberInfo {
                        id: member.signal.id().as_u64(),
                        signature: member.signal.signature().clone(),
                        connections: member
                            .paired
                            .iter()
                            .filter(|slot| state.pairs.is_live(&(member.signal.id(), **slot)))
                            .count(),
                    })
                    .collect(),
                slots: entry
                    .slots
                    .iter()
                    .map(|slot| MemberInfo {
                        id: slot.id().as_u64(),
                        signature: slot.signature().clone(),
                        connections: slot.num_connections(),
                    })
                    .collect(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("channels", &self.channels())
            .finish()
    }
}

/// Description of one proxy channel.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    /// Channel name.
    pub name: String,
    /// Registered signals.
    pub signals: Vec<MemberInfo>,
    /// Registered slots.
    pub slots: Vec<MemberInfo>,
}

/// Description of one channel member.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Signal or slot identifier.
    pub id: u64,
    /// Argument signature.
    pub signature: Signature,
    /// For a signal, its live connections through this channel. For a
    /// slot, all of its live connections.
    pub connections: usize,
}

static_assertions::assert_impl_all!(Proxy: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Signal, Signals, Slot, Slots};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_slot<Args: crate::args::SlotArgs>() -> (Slot<Args>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let slot = Slot::new(move |_: &Args| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (slot, count)
    }

    #[test]
    fn test_prefix_matching() {
        let proxy = Proxy::new();
        let (sum, sum_count) = counting_slot::<(i32, i32)>();
        proxy.connect_slot("c1", &sum);

        let wide = Signal::<(i32, i32, char)>::new();
        let narrow = Signal::<(i32,)>::new();
        let other = Signal::<(i64, i32)>::new();
        assert_eq!(proxy.connect_signal("c1", &wide), 1);
        assert_eq!(proxy.connect_signal("c1", &narrow), 0);
        assert_eq!(proxy.connect_signal("c1", &other), 0);
        assert_eq!(proxy.signal_count("c1"), 3);

        wide.emit((8, 2, 'x'));
        narrow.emit((1,));
        other.emit((1, 1));
        assert_eq!(sum_count.load(Ordering::SeqCst), 1);
        assert_eq!(sum.num_connections(), 1);
    }

    #[test]
    fn test_slot_added_after_signal() {
        let proxy = Proxy::new();
        let signal = Signal::<(i32, i32)>::new();
        proxy.connect_signal("c1", &signal);

        let (square, square_count) = counting_slot::<(i32,)>();
        let (nothing, nothing_count) = counting_slot::<()>();
        let (text, text_count) = counting_slot::<(String,)>();
        assert_eq!(proxy.connect_slot("c1", &square), 1);
        assert_eq!(proxy.connect_slot("c1", &nothing), 1);
        assert_eq!(proxy.connect_slot("c1", &text), 0);

        signal.emit((3, 5));
        assert_eq!(square_count.load(Ordering::SeqCst), 1);
        assert_eq!(nothing_count.load(Ordering::SeqCst), 1);
        assert_eq!(text_count.load(Ordering::SeqCst), 0);
        assert_eq!(proxy.slot_count("c1"), 3);
    }

    #[test]
    fn test_duplicate_registration() {
        let proxy = Proxy::new();
        let signal = Signal::<()>::new();
        let (slot, _) = counting_slot::<()>();

        proxy.connect_slot("c1", &slot);
        assert_eq!(proxy.connect_signal("c1", &signal), 1);
        assert_eq!(proxy.connect_signal("c1", &signal), 0);
        assert_eq!(proxy.connect_slot("c1", &slot), 0);
        assert_eq!(proxy.signal_count("c1"), 1);
        assert_eq!(slot.num_connections(), 1);
    }

    #[test]
    fn test_disconnect_prunes_channel() {
        let proxy = Proxy::new();
        let signal = Signal::<(i32,)>::new();
        let (slot, count) = counting_slot::<(i32,)>();
        proxy.connect_signal("c1", &signal);
        proxy.connect_slot("c1", &slot);

        assert!(proxy.disconnect_slot("c1", &slot));
        assert!(!proxy.disconnect_slot("c1", &slot));
        assert_eq!(slot.num_connections(), 0);
        assert_eq!(signal.num_connections(), 0);
        signal.emit((1,));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(proxy.has_channel("c1"));

        assert!(proxy.disconnect_signal("c1", &signal));
        assert!(!proxy.has_channel("c1"));
        assert!(!proxy.disconnect_signal("missing", &signal));
    }

    #[test]
    fn test_disconnect_signal_keeps_other_members() {
        let proxy = Proxy::new();
        let first = Signal::<()>::new();
        let second = Signal::<()>::new();
        let (slot, count) = counting_slot::<()>();
        proxy.connect_signal("c1", &first);
        proxy.connect_signal("c1", &second);
        proxy.connect_slot("c1", &slot);
        assert_eq!(slot.num_connections(), 2);

        proxy.disconnect_signal("c1", &first);
        assert_eq!(slot.num_connections(), 1);
        first.emit(());
        second.emit(());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channels_are_isolated() {
        let proxy = Proxy::new();
        let signal = Signal::<()>::new();
        let (slot, count) = counting_slot::<()>();
        proxy.connect_signal("c1", &signal);
        proxy.connect_slot("c2", &slot);

        signal.emit(());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(proxy.channels(), vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn test_pair_shared_by_two_channels() {
        let proxy = Proxy::new();
        let signal = Signal::<(i32,)>::new();
        let (slot, count) = counting_slot::<(i32,)>();
        for channel in ["c1", "c2"] {
            assert_eq!(proxy.connect_signal(channel, &signal), 0);
            assert_eq!(proxy.connect_slot(channel, &slot), 1);
        }
        assert_eq!(signal.num_connections(), 1);

        signal.emit((1,));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(proxy.disconnect_slot("c1", &slot));
        assert_eq!(slot.num_connections(), 1);
        signal.emit((2,));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        let c2 = proxy.snapshot().into_iter().find(|info| info.name == "c2");
        assert_eq!(c2.map(|info| info.signals[0].connections), Some(1));

        assert!(proxy.disconnect_signal("c2", &signal));
        assert_eq!(slot.num_connections(), 0);
        signal.emit((3,));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pair_reconnected_after_direct_disconnect() {
        let proxy = Proxy::new();
        let signal = Signal::<()>::new();
        let (slot, count) = counting_slot::<()>();
        proxy.connect_signal("c1", &signal);
        proxy.connect_slot("c1", &slot);

        signal.disconnect(&slot);
        proxy.connect_signal("c2", &signal);
        assert_eq!(proxy.connect_slot("c2", &slot), 1);
        signal.emit(());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        proxy.clear();
        assert_eq!(slot.num_connections(), 0);
    }

    #[test]
    fn test_disconnect_channel_and_clear() {
        let proxy = Proxy::new();
        let signal = Signal::<()>::new();
        let (slot, _) = counting_slot::<()>();
        proxy.connect_signal("c1", &signal);
        proxy.connect_slot("c1", &slot);
        proxy.connect_signal("c2", &signal);
        proxy.connect_slot("c2", &slot);

        assert!(proxy.disconnect_channel("c1"));
        assert!(!proxy.disconnect_channel("c1"));
        assert!(proxy.has_channel("c2"));
        assert_eq!(slot.num_connections(), 1);

        proxy.clear();
        assert!(proxy.channels().is_empty());
        assert_eq!(slot.num_connections(), 0);
        assert_eq!(signal.num_connections(), 0);
    }

    #[test]
    fn test_drop_releases_connections() {
        let signal = Signal::<()>::new();
        let (slot, _) = counting_slot::<()>();
        {
            let proxy = Proxy::new();
            proxy.connect_signal("c1", &signal);
            proxy.connect_slot("c1", &slot);
            assert_eq!(slot.num_connections(), 1);
        }
        assert_eq!(slot.num_connections(), 0);
    }

    #[test]
    fn test_connect_by_key() {
        struct Producer {
            signals: Signals,
        }
        impl HasSignals for Producer {
            fn signals(&self) -> &Signals {
                &self.signals
            }
        }
        struct Consumer {
            slots: Slots,
        }
        impl HasSlots for Consumer {
            fn slots(&self) -> &Slots {
                &self.slots
            }
        }

        let producer = Producer { signals: Signals::new() };
        let consumer = Consumer { slots: Slots::new() };
        let modified = producer.signals.new_signal::<(i32,)>("modified").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        consumer
            .slots
            .new_slot("update", move |_: &(i32,)| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let proxy = Proxy::new();
        assert_eq!(proxy.connect_signal_key("data", &producer, "modified"), Ok(0));
        assert_eq!(proxy.connect_slot_key("data", &consumer, "update"), Ok(1));
        assert_eq!(
            proxy.connect_slot_key("data", &consumer, "missing"),
            Err(ProxyError::UnknownSlot("missing".to_string()))
        );
        assert_eq!(
            proxy.connect_signal_key("data", &producer, "missing"),
            Err(ProxyError::UnknownSignal("missing".to_string()))
        );

        modified.emit((1,));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert_eq!(proxy.disconnect_slot_key("data", &consumer, "update"), Ok(true));
        assert_eq!(proxy.disconnect_signal_key("data", &producer, "modified"), Ok(true));
        assert!(!proxy.has_channel("data"));
    }

    #[test]
    fn test_snapshot() {
        let proxy = Proxy::new();
        let signal = Signal::<(i32,)>::new();
        let (slot, _) = counting_slot::<(i32,)>();
        proxy.connect_signal("b", &signal);
        proxy.connect_slot("b", &slot);
        proxy.connect_slot("a", &slot);

        let snapshot = proxy.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "a");
        assert_eq!(snapshot[1].signals[0].id, signal.id().as_u64());
        assert_eq!(snapshot[1].signals[0].connections, 1);
        assert_eq!(snapshot[1].slots[0].connections, 1);
    }
}
