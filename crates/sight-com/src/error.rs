//! Error types for the communication core.

/// The main error type for sight-com operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComError {
    /// Signal-related error.
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),
    /// Slot-related error.
    #[error("Slot error: {0}")]
    Slot(#[from] SlotError),
    /// Worker-related error.
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
    /// Proxy-related error.
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
    /// Keyed registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Signal-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// The slot cannot receive what the signal emits.
    #[error("slot signature {slot} cannot receive signal signature {signal}")]
    IncompatibleSignature {
        /// Signature emitted by the signal.
        signal: String,
        /// Signature expected by the slot.
        slot: String,
    },
}

/// Slot-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    /// The slot has no worker to post to.
    #[error("slot has no worker bound")]
    NoWorker,
    /// The bound worker refused the task.
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Worker-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// The worker has been stopped and accepts no more tasks.
    #[error("worker has been stopped")]
    Stopped,
    /// The worker's bounded task queue is full.
    #[error("worker task queue is full")]
    QueueFull,
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Proxy-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// No signal is registered under the key.
    #[error("no signal registered under key '{0}'")]
    UnknownSignal(String),
    /// No slot is registered under the key.
    #[error("no slot registered under key '{0}'")]
    UnknownSlot(String),
}

/// Errors from the keyed [`Signals`](crate::Signals) and [`Slots`](crate::Slots) maps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The key is already used by a member of another type.
    #[error("key '{key}' is already registered with a type other than {requested}")]
    TypeMismatch {
        /// The key that was looked up.
        key: String,
        /// The type that was requested.
        requested: &'static str,
    },
    /// A slot is already registered under the key.
    #[error("key '{0}' is already registered")]
    DuplicateKey(String),
}

/// A specialized Result type for sight-com operations.
pub type Result<T> = std::result::Result<T, ComError>;
