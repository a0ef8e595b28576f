//! spi2ahb - Memory access over an SPI2AHB bridge
//!
//! Reads and writes the AHB address space of a remote peripheral through
//! an FT4222H USB to SPI bridge, using the SPI2AHB command protocol.
//!
//! # Architecture
//!
//! - `spi2ahb-core` implements the protocol on top of a `Transport`
//! - backend crates (`spi2ahb-ft4222`, `spi2ahb-dummy`) provide transports
//! - this binary parses flags, opens a backend and runs the requested
//!   operations in a fixed order

mod cli;
mod commands;
mod input;
mod programmers;

use std::time::Duration;

use clap::Parser;
use cli::Cli;
use commands::RunOptions;
use spi2ahb_core::{ProtocolConfig, Spi2Ahb};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if cli.list_programmers {
        programmers::list_programmers();
        return;
    }

    if !cli.has_operations() {
        eprintln!("Nothing to do (see --help)");
        std::process::exit(2);
    }
    let ops = commands::plan_operations(&cli);

    let transport = match programmers::open_programmer(&cli.programmer, cli.div) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to open programmer '{}': {}", cli.programmer, e);
            std::process::exit(1);
        }
    };

    let config = ProtocolConfig::new()
        .with_poll_retries(cli.retries)
        .with_poll_delay(Duration::from_micros(cli.delay))
        .with_max_chunk(cli.chunk)
        .with_trace(cli.trace);
    log::debug!("{:?}", config);

    let mut bridge = Spi2Ahb::new(transport, config);
    let options = RunOptions {
        swap: cli.swap,
        verify: cli.verify,
    };

    let failures = commands::run_operations(&mut bridge, &ops, options, &mut std::io::stdout());
    if failures > 0 {
        log::error!("{} of {} operation(s) failed", failures, ops.len());
        std::process::exit(1);
    }
}
