//! CLI argument parsing

use crate::programmers;
use clap::Parser;
use spi2ahb_core::{LengthClass, Trace};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a dump size, hex or decimal
fn parse_size(s: &str) -> Result<usize, String> {
    parse_hex_u32(s).map(|v| v as usize)
}

fn parse_trace(s: &str) -> Result<Trace, String> {
    Trace::parse(s).ok_or_else(|| {
        format!(
            "Invalid trace '{}' (expected none, write, read, status or dump)",
            s
        )
    })
}

fn parse_chunk(s: &str) -> Result<LengthClass, String> {
    match s.parse::<usize>() {
        Ok(128) => Ok(LengthClass::B128),
        Ok(256) => Ok(LengthClass::B256),
        _ => Err(format!("Invalid chunk size '{}' (expected 128 or 256)", s)),
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use, as name[:key=value,...] [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser, Debug)]
#[command(name = "spi2ahb")]
#[command(author, version, about = "Memory access over an SPI2AHB bridge", long_about = None)]
#[command(after_help = "Operations run in this order: base, data, string, script, file, read, dump.\n\
    A failing operation is reported and the remaining ones still run.")]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// List available programmers and attached devices, then exit
    #[arg(long)]
    pub list_programmers: bool,

    #[arg(short, long, default_value = "ft4222", help = programmer_help())]
    pub programmer: String,

    /// SPI clock division (overrides the programmer's div option)
    #[arg(short = 'd', long)]
    pub div: Option<u32>,

    /// Target address (hex with 0x prefix, or decimal)
    #[arg(short, long, value_parser = parse_hex_u32)]
    pub addr: Option<u32>,

    /// Write a 32-bit value at --addr
    #[arg(short = 'D', long, value_parser = parse_hex_u32, requires = "addr")]
    pub data: Option<u32>,

    /// Read a 32-bit value at --addr
    #[arg(short, long, requires = "addr")]
    pub read: bool,

    /// Dump SIZE bytes starting at --addr
    #[arg(short = 'm', long, value_name = "SIZE", value_parser = parse_size, requires = "addr")]
    pub dump: Option<usize>,

    /// Write a hex byte string at --addr
    #[arg(short, long, value_name = "HEX", requires = "addr")]
    pub string: Option<String>,

    /// Write the bytes of a hex script file at --addr
    #[arg(short = 'S', long, value_name = "FILE", requires = "addr")]
    pub script: Option<PathBuf>,

    /// Write a binary file at --addr
    #[arg(short, long, value_name = "FILE", requires = "addr")]
    pub file: Option<PathBuf>,

    /// Reverse the bytes of every 32-bit word of --file data and dumps
    #[arg(long)]
    pub swap: bool,

    /// Read back and compare after every write
    #[arg(short = 'c', long)]
    pub verify: bool,

    /// Print the remote window base register
    #[arg(short, long)]
    pub base: bool,

    /// Echo frames of one kind at info level
    #[arg(short, long, value_parser = parse_trace, default_value = "none")]
    pub trace: Trace,

    /// Delay between status polls in microseconds
    #[arg(short = 'i', long, value_name = "US", default_value_t = 100)]
    pub delay: u64,

    /// Status polls before a transfer times out
    #[arg(long, default_value_t = spi2ahb_core::config::DEFAULT_POLL_RETRIES)]
    pub retries: u32,

    /// Largest frame size in bytes (128 or 256)
    #[arg(long, value_parser = parse_chunk, default_value = "256")]
    pub chunk: LengthClass,
}

impl Cli {
    /// Returns true if any bus operation was requested
    pub fn has_operations(&self) -> bool {
        self.base
            || self.data.is_some()
            || self.string.is_some()
            || self.script.is_some()
            || self.file.is_some()
            || self.read
            || self.dump.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("0XDEADBEEF"), Ok(0xDEAD_BEEF));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("").is_err());
    }

    #[test]
    fn test_parse_chunk() {
        assert_eq!(parse_chunk("128"), Ok(LengthClass::B128));
        assert_eq!(parse_chunk("256"), Ok(LengthClass::B256));
        assert!(parse_chunk("64").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "spi2ahb", "-p", "dummy", "-a", "0x20000000", "-D", "0x12345678", "-r", "-m",
            "0x40", "-t", "write", "-c", "--chunk", "128",
        ])
        .unwrap();
        assert_eq!(cli.programmer, "dummy");
        assert_eq!(cli.addr, Some(0x2000_0000));
        assert_eq!(cli.data, Some(0x1234_5678));
        assert!(cli.read);
        assert_eq!(cli.dump, Some(0x40));
        assert_eq!(cli.trace, Trace::WriteTrace);
        assert!(cli.verify);
        assert_eq!(cli.chunk, LengthClass::B128);
        assert!(cli.has_operations());
    }

    #[test]
    fn test_cli_operation_requires_addr() {
        assert!(Cli::try_parse_from(["spi2ahb", "-r"]).is_err());
        assert!(Cli::try_parse_from(["spi2ahb", "-s", "0011"]).is_err());

        let cli = Cli::try_parse_from(["spi2ahb", "-b"]).unwrap();
        assert!(cli.base);
        assert_eq!(cli.retries, 10);
        assert_eq!(cli.delay, 100);
    }
}
