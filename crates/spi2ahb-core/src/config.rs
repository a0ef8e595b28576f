//! Protocol tuning knobs

use std::time::Duration;

use crate::command::{LengthClass, MAX_WAIT_CYCLES};

/// Default number of status polls before giving up
pub const DEFAULT_POLL_RETRIES: u32 = 10;

/// Default delay between status polls
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_micros(100);

/// Default delay between a base register write and its read-back
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1);

/// Number of write/verify rounds when switching windows
pub const WINDOW_SWITCH_ATTEMPTS: u32 = 3;

/// Which frames to echo at info level
///
/// Frames that are not selected are still logged at trace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trace {
    /// No frame echo
    #[default]
    None,
    /// Write frames
    WriteTrace,
    /// Read request and read data frames
    ReadTrace,
    /// Status queries and their answers
    StatusTrace,
    /// Data returned by dump reads
    DumpTrace,
}

impl Trace {
    /// Parse from a CLI-style name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Some(Trace::None),
            "write" | "w" => Some(Trace::WriteTrace),
            "read" | "r" => Some(Trace::ReadTrace),
            "status" | "s" => Some(Trace::StatusTrace),
            "dump" | "d" => Some(Trace::DumpTrace),
            _ => None,
        }
    }
}

/// Settings shared by every layer of the protocol
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Status polls per handshake
    pub poll_retries: u32,
    /// Sleep between status polls
    pub poll_delay: Duration,
    /// Sleep after writing the window base register
    pub settle_delay: Duration,
    /// Largest frame issued by the chunked engine
    pub max_chunk: LengthClass,
    /// Wait cycles placed in the read-data command byte
    pub read_wait_cycles: u8,
    /// Frame echo selection
    pub trace: Trace,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            poll_retries: DEFAULT_POLL_RETRIES,
            poll_delay: DEFAULT_POLL_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_chunk: LengthClass::B256,
            read_wait_cycles: 0,
            trace: Trace::None,
        }
    }
}

impl ProtocolConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status poll ceiling (at least one poll is always made)
    pub fn with_poll_retries(mut self, retries: u32) -> Self {
        self.poll_retries = retries.max(1);
        self
    }

    /// Set the delay between status polls
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Set the base register settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the frame ceiling of the chunked engine
    pub fn with_max_chunk(mut self, class: LengthClass) -> Self {
        self.max_chunk = class;
        self
    }

    /// Set the read-data wait cycles (clamped to 0-3)
    pub fn with_read_wait_cycles(mut self, cycles: u8) -> Self {
        self.read_wait_cycles = cycles.min(MAX_WAIT_CYCLES);
        self
    }

    /// Set the frame echo selection
    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    /// Configuration without any sleeps, for emulated devices
    pub fn no_delay() -> Self {
        Self::default()
            .with_poll_delay(Duration::ZERO)
            .with_settle_delay(Duration::ZERO)
    }

    pub(crate) fn traces(&self, trace: Trace) -> bool {
        self.trace == trace && trace != Trace::None
    }
}

/// Format bytes as space separated hex for trace output
pub(crate) fn hex_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_parse() {
        assert_eq!(Trace::parse("write"), Some(Trace::WriteTrace));
        assert_eq!(Trace::parse("R"), Some(Trace::ReadTrace));
        assert_eq!(Trace::parse("status"), Some(Trace::StatusTrace));
        assert_eq!(Trace::parse("d"), Some(Trace::DumpTrace));
        assert_eq!(Trace::parse("none"), Some(Trace::None));
        assert_eq!(Trace::parse("x"), None);
    }

    #[test]
    fn test_builder_clamps() {
        let cfg = ProtocolConfig::new()
            .with_poll_retries(0)
            .with_read_wait_cycles(7);
        assert_eq!(cfg.poll_retries, 1);
        assert_eq!(cfg.read_wait_cycles, 3);
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(hex_bytes(&[0x80, 0x0A, 0xFF]), "80 0A FF");
        assert_eq!(hex_bytes(&[]), "");
    }
}
