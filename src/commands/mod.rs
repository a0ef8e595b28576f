//! CLI operation implementations
//!
//! The CLI can request several operations in one run. They are planned into
//! a fixed order (base, data, string, script, file, read, dump) and each one
//! is reported on its own: a failure is printed with the phase and address
//! and the next operation still runs.

mod dump;
mod progress;

use std::io::Write;
use std::path::PathBuf;

use spi2ahb_core::{Spi2Ahb, Transport};

use crate::cli::Cli;
use crate::input;

pub use dump::format_dump;
pub use progress::BarProgress;

/// One requested bus operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Print the window base register
    Base,
    /// Write one 32-bit value
    WriteWord { addr: u32, value: u32 },
    /// Write the bytes of a hex string
    WriteString { addr: u32, hex: String },
    /// Write the bytes of a hex script file
    WriteScript { addr: u32, path: PathBuf },
    /// Write a binary file
    WriteFile { addr: u32, path: PathBuf },
    /// Read and print one 32-bit value
    ReadWord { addr: u32 },
    /// Read and print a hex dump
    Dump { addr: u32, len: usize },
}

impl Operation {
    /// Short name used in failure messages
    pub fn phase(&self) -> &'static str {
        match self {
            Operation::Base => "base",
            Operation::WriteWord { .. } => "data write",
            Operation::WriteString { .. } => "string write",
            Operation::WriteScript { .. } => "script write",
            Operation::WriteFile { .. } => "file write",
            Operation::ReadWord { .. } => "read",
            Operation::Dump { .. } => "dump",
        }
    }

    /// Target address, if the operation has one
    pub fn addr(&self) -> Option<u32> {
        match self {
            Operation::Base => None,
            Operation::WriteWord { addr, .. }
            | Operation::WriteString { addr, .. }
            | Operation::WriteScript { addr, .. }
            | Operation::WriteFile { addr, .. }
            | Operation::ReadWord { addr }
            | Operation::Dump { addr, .. } => Some(*addr),
        }
    }
}

/// Flags shared by the write and dump operations
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Word-swap binary file data and dumps
    pub swap: bool,
    /// Read back after writing
    pub verify: bool,
}

/// Turn CLI flags into operations in execution order
pub fn plan_operations(cli: &Cli) -> Vec<Operation> {
    let mut ops = Vec::new();

    if cli.base {
        ops.push(Operation::Base);
    }

    let Some(addr) = cli.addr else {
        return ops;
    };

    if let Some(value) = cli.data {
        ops.push(Operation::WriteWord { addr, value });
    }
    if let Some(hex) = &cli.string {
        ops.push(Operation::WriteString {
            addr,
            hex: hex.clone(),
        });
    }
    if let Some(path) = &cli.script {
        ops.push(Operation::WriteScript {
            addr,
            path: path.clone(),
        });
    }
    if let Some(path) = &cli.file {
        ops.push(Operation::WriteFile {
            addr,
            path: path.clone(),
        });
    }
    if cli.read {
        ops.push(Operation::ReadWord { addr });
    }
    if let Some(len) = cli.dump {
        ops.push(Operation::Dump { addr, len });
    }

    ops
}

/// Run every operation, returning how many failed
pub fn run_operations<T: Transport>(
    bridge: &mut Spi2Ahb<T>,
    ops: &[Operation],
    options: RunOptions,
    out: &mut dyn Write,
) -> usize {
    let mut failures = 0;

    for op in ops {
        if let Err(e) = run_operation(bridge, op, options, out) {
            failures += 1;
            let reported = match op.addr() {
                Some(addr) => writeln!(out, "{} at 0x{:08X} failed: {}", op.phase(), addr, e),
                None => writeln!(out, "{} failed: {}", op.phase(), e),
            };
            if let Err(io) = reported {
                log::error!("failed to report {} failure: {}", op.phase(), io);
            }
        }
    }

    failures
}

fn run_operation<T: Transport>(
    bridge: &mut Spi2Ahb<T>,
    op: &Operation,
    options: RunOptions,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match op {
        Operation::Base => {
            let base = bridge.read_base()?;
            writeln!(out, "SPI2AHB Base Addr 0x{:08x}", base)?;
        }
        Operation::WriteWord { addr, value } => {
            // Same byte order as write_word32
            bridge.write_range(*addr, &value.to_be_bytes(), false, options.verify)?;
            writeln!(out, "Wrote 0x{:08X} to 0x{:08X}", value, addr)?;
        }
        Operation::WriteString { addr, hex } => {
            let data = input::parse_hex_string(hex)?;
            write_bytes(bridge, *addr, &data, false, options.verify, out)?;
        }
        Operation::WriteScript { addr, path } => {
            let data = input::read_script(path)?;
            write_bytes(bridge, *addr, &data, false, options.verify, out)?;
        }
        Operation::WriteFile { addr, path } => {
            let data = input::read_binary(path)?;
            write_bytes(bridge, *addr, &data, options.swap, options.verify, out)?;
        }
        Operation::ReadWord { addr } => {
            let value = bridge.read_word32(*addr)?;
            writeln!(out, "0x{:08X}: 0x{:08X}", addr, value)?;
        }
        Operation::Dump { addr, len } => {
            let mut progress = BarProgress::new("Dump complete");
            let data = bridge.read_range_with_progress(*addr, *len, options.swap, &mut progress)?;
            for line in format_dump(*addr, &data) {
                writeln!(out, "{}", line)?;
            }
        }
    }

    Ok(())
}

fn write_bytes<T: Transport>(
    bridge: &mut Spi2Ahb<T>,
    addr: u32,
    data: &[u8],
    swap: bool,
    verify: bool,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut progress = BarProgress::new("Write complete");
    bridge.write_range_with_progress(addr, data, swap, verify, &mut progress)?;

    if verify {
        writeln!(out, "Wrote and verified {} bytes at 0x{:08X}", data.len(), addr)?;
    } else {
        writeln!(out, "Wrote {} bytes at 0x{:08X}", data.len(), addr)?;
    }
    Ok(())
}
