//! Signal/slot communication core for Sight components.
//!
//! This crate provides the runtime that loosely coupled components use to
//! notify each other:
//!
//! - **Signals**: Typed multi-subscriber event sources with synchronous and
//!   asynchronous emission
//! - **Slots**: Typed callable endpoints, optionally bound to a worker
//! - **Connections**: Revocable, blockable signal-to-slot links
//! - **Proxy**: Named channels pairing signals and slots by signature at runtime
//! - **Registry**: String-keyed signal and slot maps owned by components
//! - **Workers & Timers**: Single-threaded task queues with timers bound to them
//!
//! # Signal/Slot Example
//!
//! ```
//! use sight_com::{Signal, Slot};
//!
//! let value_changed = Signal::<(i32,)>::new();
//! let print = Slot::new(|&(value,): &(i32,)| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! let connection = value_changed.connect(&print);
//! value_changed.emit((42,));
//! connection.disconnect();
//! ```
//!
//! # Channel Example
//!
//! ```
//! use sight_com::{Proxy, Signal, Slot, Worker};
//! use std::time::Duration;
//!
//! let worker = Worker::new().unwrap();
//! let (sender, receiver) = crossbeam_channel::unbounded();
//! let sum = Slot::with_worker(
//!     move |&(a, b): &(i32, i32)| sender.send(a + b).unwrap(),
//!     &worker,
//! );
//! let modified = Signal::<(i32, i32, char)>::new();
//!
//! let proxy = Proxy::global();
//! proxy.connect_slot("channel1", &sum);
//! proxy.connect_signal("channel1", &modified);
//!
//! modified.async_emit((8, 2, 'x'));
//! assert_eq!(receiver.recv_timeout(Duration::from_secs(1)), Ok(10));
//!
//! Proxy::shutdown_global();
//! worker.stop();
//! ```
//!
//! # Timer Example
//!
//! ```
//! use sight_com::Worker;
//! use std::time::Duration;
//!
//! let worker = Worker::new().unwrap();
//! let (sender, receiver) = crossbeam_channel::unbounded();
//!
//! let timer = worker.create_timer();
//! timer.set_duration(Duration::from_millis(10));
//! timer.set_one_shot(true);
//! timer.set_function(move || {
//!     let _ = sender.send(());
//! });
//! timer.start();
//!
//! assert!(receiver.recv_timeout(Duration::from_secs(1)).is_ok());
//! worker.stop();
//! ```

pub mod args;
pub mod connection;
mod error;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod signal;
pub mod slot;
mod timer;
pub mod worker;

pub use args::{ErasedArgs, Signature, SlotArgs};
pub use connection::{Blocker, Connection, ConnectionGuard, ConnectionId, Connections};
pub use error::{
    ComError, ProxyError, RegistryError, Result, SignalError, SlotError, WorkerError,
};
pub use logging::ChannelTableDebug;
pub use proxy::{ChannelInfo, MemberInfo, Proxy};
pub use registry::{HasSignals, HasSlots, Signals, Slots};
pub use signal::{ErasedSignal, Signal, SignalId};
pub use slot::{ErasedSlot, PendingCall, Slot, SlotId};
pub use timer::Timer;
pub use worker::{
    ActiveWorkers, DEFAULT_WORKER, Worker, WorkerBuilder, WorkerConfig, active_workers,
};
