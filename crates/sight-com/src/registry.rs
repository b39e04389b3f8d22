//! String-keyed signal and slot maps owned by components.
//!
//! Components register their signals and slots under well-known keys while
//! starting, so that declarative wiring can find them by name and hand them
//! to the [`Proxy`](crate::Proxy) without knowing their concrete types.
//!
//! # Example
//!
//! ```
//! use sight_com::{HasSignals, Signals};
//!
//! struct Image {
//!     signals: Signals,
//! }
//!
//! impl HasSignals for Image {
//!     fn signals(&self) -> &Signals {
//!         &self.signals
//!     }
//! }
//!
//! let image = Image { signals: Signals::new() };
//! let modified = image.signals.new_signal::<(i32,)>("modified").unwrap();
//!
//! let found = image.signals().signal::<(i32,)>("modified").unwrap();
//! assert_eq!(found.id(), modified.id());
//! assert!(image.signals().signal::<(String,)>("modified").is_none());
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::args::SlotArgs;
use crate::error::RegistryError;
use crate::signal::{ErasedSignal, Signal};
use crate::slot::{ErasedSlot, Slot};
use crate::worker::Worker;

struct Entry<E> {
    typed: Box<dyn Any + Send + Sync>,
    erased: E,
}

impl<E> Entry<E> {
    fn typed<T: Clone + 'static>(&self) -> Option<T> {
        self.typed.downcast_ref::<T>().cloned()
    }
}

fn sorted_keys<E>(entries: &HashMap<String, Entry<E>>) -> Vec<String> {
    let mut keys: Vec<String> = entries.keys().cloned().collect();
    keys.sort();
    keys
}

/// The signals of one component, by key.
#[derive(Default)]
pub struct Signals {
    entries: RwLock<HashMap<String, Entry<ErasedSignal>>>,
}

impl Signals {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signal under `key`, or return the one already there.
    ///
    /// Fails if the key holds a signal with different arguments.
    pub fn new_signal<Args: SlotArgs>(
        &self,
        key: impl Into<String>,
    ) -> Result<Signal<Args>, RegistryError> {
        let key = key.into();
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&key) {
            return entry.typed::<Signal<Args>>().ok_or(RegistryError::TypeMismatch {
                key,
                requested: type_name::<Args>(),
            });
        }

        let signal = Signal::<Args>::new();
        entries.insert(
            key,
            Entry {
                typed: Box::new(signal.clone()),
                erased: ErasedSignal::from(&signal),
            },
        );
        Ok(signal)
    }

    /// The signal under `key`, if it has arguments `Args`.
    pub fn signal<Args: SlotArgs>(&self, key: &str) -> Option<Signal<Args>> {
        self.entries.read().get(key)?.typed::<Signal<Args>>()
    }

    /// The signal under `key`, whatever its arguments.
    pub fn erased(&self, key: &str) -> Option<ErasedSignal> {
        self.entries.read().get(key).map(|entry| entry.erased.clone())
    }

    /// Whether a signal is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        sorted_keys(&self.entries.read())
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no signal is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Unregister the signal under `key`.
    pub fn remove(&self, key: &str) -> Option<ErasedSignal> {
        self.entries.write().remove(key).map(|entry| entry.erased)
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signals").field("keys", &self.keys()).finish()
    }
}

/// The slots of one component, by key.
#[derive(Default)]
pub struct Slots {
    entries: RwLock<HashMap<String, Entry<ErasedSlot>>>,
}

impl Slots {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot from `function` and register it under `key`.
    pub fn new_slot<Args, R, F>(
        &self,
        key: impl Into<String>,
        function: F,
    ) -> Result<Slot<Args, R>, RegistryError>
    where
        Args: SlotArgs,
        R: Send + 'static,
        F: Fn(&Args) -> R + Send + Sync + 'static,
    {
        let slot = Slot::new(function);
        self.insert(key, slot.clone())?;
        Ok(slot)
    }

    /// Register an existing slot under `key`.
    pub fn insert<Args, R>(
        &self,
        key: impl Into<String>,
        slot: Slot<Args, R>,
    ) -> Result<(), RegistryError>
    where
        Args: SlotArgs,
        R: Send + 'static,
    {
        let key = key.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey(key));
        }
        entries.insert(
            key,
            Entry {
                erased: ErasedSlot::from(&slot),
                typed: Box::new(slot),
            },
        );
        Ok(())
    }

    /// The slot under `key`, if it has arguments `Args` and result `R`.
    pub fn slot<Args, R>(&self, key: &str) -> Option<Slot<Args, R>>
    where
        Args: SlotArgs,
        R: 'static,
    {
        self.entries.read().get(key)?.typed::<Slot<Args, R>>()
    }

    /// The slot under `key`, whatever its arguments.
    pub fn erased(&self, key: &str) -> Option<ErasedSlot> {
        self.entries.read().get(key).map(|entry| entry.erased.clone())
    }

    /// Whether a slot is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        sorted_keys(&self.entries.read())
    }

    /// Number of registered slots.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no slot is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Unregister the slot under `key`.
    pub fn remove(&self, key: &str) -> Option<ErasedSlot> {
        self.entries.write().remove(key).map(|entry| entry.erased)
    }

    /// Bind every registered slot to `worker`.
    pub fn set_worker(&self, worker: &Worker) {
        for entry in self.entries.read().values() {
            entry.erased.set_worker(worker);
        }
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots").field("keys", &self.keys()).finish()
    }
}

/// A component exposing keyed signals.
pub trait HasSignals {
    /// The component's signal map.
    fn signals(&self) -> &Signals;
}

/// A component exposing keyed slots.
pub trait HasSlots {
    /// The component's slot map.
    fn slots(&self) -> &Slots;
}
