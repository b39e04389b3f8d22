//! Logging and debugging facilities for sight-com.
//!
//! This module provides:
//! - Target names for filtering the `tracing` output of each subsystem
//! - A readable dump of a proxy's channel table
//!
//! # Tracing Integration
//!
//! sight-com uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("sight_com::proxy=debug")
//!     .init();
//! ```
//!
//! # Channel Dump
//!
//! ```
//! use sight_com::logging::ChannelTableDebug;
//! use sight_com::{Proxy, Signal};
//!
//! let proxy = Proxy::new();
//! let modified = Signal::<(i32,)>::new();
//! proxy.connect_signal("modified", &modified);
//!
//! let dump = ChannelTableDebug::new(&proxy).to_string();
//! assert!(dump.contains("modified"));
//! ```

use std::any::Any;
use std::fmt::{self, Write as FmtWrite};

use crate::proxy::{ChannelInfo, Proxy};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Crate-wide target.
    pub const CORE: &str = "sight_com";
    /// Signal emission and connection bookkeeping.
    pub const SIGNAL: &str = "sight_com::signal";
    /// Slot invocation.
    pub const SLOT: &str = "sight_com::slot";
    /// Channel registry.
    pub const PROXY: &str = "sight_com::proxy";
    /// Worker threads.
    pub const WORKER: &str = "sight_com::worker";
    /// Timers.
    pub const TIMER: &str = "sight_com::timer";
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Debug view of every channel registered on a [`Proxy`].
///
/// ```text
/// Proxy (1 channels):
/// channel1
///   signal #3 (i32, i32) -> 2 connection(s)
///   slot #7 (i32, i32) [1 connection(s)]
///   slot #8 (alloc::string::String,) [0 connection(s)]
/// ```
pub struct ChannelTableDebug {
    channels: Vec<ChannelInfo>,
    show_signatures: bool,
}

impl ChannelTableDebug {
    /// Capture the current channel table of `proxy`.
    pub fn new(proxy: &Proxy) -> Self {
        Self {
            channels: proxy.snapshot(),
            show_signatures: true,
        }
    }

    /// Hide argument signatures for a more compact dump.
    pub fn without_signatures(mut self) -> Self {
        self.show_signatures = false;
        self
    }

    fn format_into(&self, output: &mut String) -> fmt::Result {
        writeln!(output, "Proxy ({} channels):", self.channels.len())?;
        if self.channels.is_empty() {
            writeln!(output, "  (empty)")?;
        }

        for channel in &self.channels {
            writeln!(output, "{}", channel.name)?;
            for signal in &channel.signals {
                write!(output, "  signal #{}", signal.id)?;
                if self.show_signatures {
                    write!(output, " {}", signal.signature)?;
                }
                writeln!(output, " -> {} connection(s)", signal.connections)?;
            }
            for slot in &channel.slots {
                write!(output, "  slot #{}", slot.id)?;
                if self.show_signatures {
                    write!(output, " {}", slot.signature)?;
                }
                writeln!(output, " [{} connection(s)]", slot.connections)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ChannelTableDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::new();
        self.format_into(&mut output)?;
        f.write_str(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Signal, Slot};

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn test_empty_table() {
        let proxy = Proxy::new();
        let output = ChannelTableDebug::new(&proxy).to_string();
        assert!(output.contains("Proxy (0 channels)"));
        assert!(output.contains("(empty)"));
    }

    #[test]
    fn test_table_lists_members() {
        let proxy = Proxy::new();
        let signal = Signal::<(i32, i32)>::new();
        let sum = Slot::new(|_: &(i32, i32)| {});
        proxy.connect_signal("channel1", &signal);
        proxy.connect_slot("channel1", &sum);

        let output = ChannelTableDebug::new(&proxy).to_string();
        assert!(output.contains("channel1"));
        assert!(output.contains("(i32, i32) -> 1 connection(s)"));
        assert!(output.contains("[1 connection(s)]"));

        let compact = ChannelTableDebug::new(&proxy).without_signatures().to_string();
        assert!(!compact.contains("(i32, i32)"));
    }
}
