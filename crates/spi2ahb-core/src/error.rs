//! Error types for spi2ahb-core

use thiserror::Error;

use crate::command::Op;

/// Errors raised by the SPI2AHB protocol layer
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying SPI exchange failed
    #[error("SPI exchange failed: {0}")]
    Transport(String),

    /// The remote side never raised its ready flag
    #[error("{op} status not ready after {polls} polls")]
    Timeout {
        /// Direction that was being polled
        op: Op,
        /// Number of status queries issued
        polls: u32,
    },

    /// The window base register could not be confirmed
    #[error("failed to switch window base to 0x{base:08X} after {attempts} attempts")]
    WindowSwitchFailed {
        /// Requested window base
        base: u32,
        /// Write/verify rounds attempted
        attempts: u32,
    },

    /// Transfer size is not one of the supported length classes
    #[error("unsupported transfer length {0} (expected 4, 16, 32, 64, 128 or 256 bytes)")]
    InvalidLength(usize),

    /// Range crosses a 32 MiB window boundary
    #[error("range 0x{addr:08X}+0x{len:X} crosses a 32 MiB window boundary")]
    WindowBoundary {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: usize,
    },

    /// Address is not word aligned
    #[error("address 0x{0:08X} is not word aligned")]
    Misaligned(u32),

    /// Range does not fit the 32-bit address space
    #[error("range 0x{addr:08X}+0x{len:X} exceeds the 32-bit address space")]
    AddressOutOfRange {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: usize,
    },

    /// Read-back after write differs from the source data
    #[error("verify failed: {0} byte(s) differ")]
    VerifyMismatch(usize),
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
