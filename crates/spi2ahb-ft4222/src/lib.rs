//! spi2ahb-ft4222 - FT4222H USB SPI transport
//!
//! This crate drives the FTDI FT4222H USB to SPI bridge as an SPI master
//! and exposes it as a [`spi2ahb_core::Transport`]. It talks to the chip
//! with raw vendor control and bulk transfers through `nusb`, so the
//! proprietary LibFT4222 is not needed.
//!
//! # Transfers
//!
//! - **Single I/O**: one full-duplex transaction; bytes clocked in while
//!   the write phase is on the wire are discarded.
//! - **Dual/Quad I/O**: one half-duplex transaction framed by the FT4222
//!   multi-I/O header, with the whole request in the multi-I/O write phase
//!   followed by the read phase.
//!
//! # Example
//!
//! ```no_run
//! use spi2ahb_core::{ProtocolConfig, Spi2Ahb};
//! use spi2ahb_ft4222::{Ft4222, SpiConfig};
//!
//! let config = SpiConfig::new().with_division(8).with_cs(0);
//! let ft4222 = Ft4222::open_with_config(config)?;
//! let mut bridge = Spi2Ahb::new(ft4222, ProtocolConfig::default());
//! println!("base: 0x{:08X}", bridge.read_base()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Programmer Options
//!
//! - `index=<n>` - Which attached FT4222H to open (default: 0)
//! - `div=<n>` - Division of the 80 MHz system clock (default: 128)
//! - `spispeed=<kHz>` - Target SPI clock in kHz, overrides `div`
//! - `cs=<0-3>` - Chip select line to use (default: 0)
//! - `iomode=<single|dual|quad>` - I/O mode (default: quad)
//!
//! # SPI Clock
//!
//! ```text
//! SPI_clock = system_clock / divisor
//! ```
//!
//! `div` always uses the 80 MHz system clock. Divisors are powers of two
//! from 2 to 512; other values round down to the nearest supported one and
//! 0 or 1 run the bus undivided.
//!
//! # Known Differences from LibFT4222
//!
//! The pad driving strength is left at the chip's power-on default.
//! LibFT4222 based tools usually select 8 mA at init, but the raw USB
//! request for it is undocumented. Boards with long or heavily loaded SPI
//! lines may need a higher `div` to compensate.

mod device;
mod error;
mod protocol;

pub use device::{parse_options, Ft4222, Ft4222DeviceInfo};
pub use error::{Ft4222Error, Result};
pub use protocol::{ClockConfig, ClockDivisor, IoMode, SpiConfig, SystemClock};
