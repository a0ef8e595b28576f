//! spi2ahb-core - SPI2AHB memory access protocol
//!
//! This crate implements the protocol that turns a plain SPI exchange
//! primitive into 32-bit memory reads and writes on a remote AHB bus.
//!
//! # Layers
//!
//! ```text
//!  Spi2Ahb (bridge)     range splitting, word swap, verify, progress
//!      |
//!  WindowManager        32 MiB window base cache and switching
//!      |
//!  word engine          one 4..256 byte write or read
//!      |
//!  status + command     ready polling, header encoding
//!      |
//!  Transport            exchange(write, read_len), provided by a backend
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spi2ahb_core::{ProtocolConfig, Spi2Ahb};
//!
//! let mut bridge = Spi2Ahb::new(transport, ProtocolConfig::default());
//! println!("base: 0x{:08X}", bridge.read_base()?);
//! bridge.write_range(0x2000_0000, &payload, false, true)?;
//! let data = bridge.read_range(0x2000_0000, payload.len())?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod plan;
pub mod status;
pub mod transport;
pub mod window;
pub mod word;

pub use bridge::{swap_words, NoProgress, Spi2Ahb, TransferProgress};
pub use command::{LengthClass, Op, BASE_ADDR_REG, WINDOW_SIZE};
pub use config::{ProtocolConfig, Trace};
pub use error::{Error, Result};
pub use plan::{Frame, TransferPlan};
pub use transport::Transport;
pub use window::WindowManager;
