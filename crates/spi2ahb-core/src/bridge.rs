//! Chunked transfer engine
//!
//! [`Spi2Ahb`] is the handle the rest of the program talks to. It owns the
//! transport, the window cache and the protocol configuration, and turns
//! arbitrary ranges into planned frames.

use std::borrow::Cow;

use crate::command::window_offset;
use crate::config::{hex_bytes, ProtocolConfig, Trace};
use crate::error::{Error, Result};
use crate::plan::{Frame, TransferPlan};
use crate::transport::Transport;
use crate::window::WindowManager;
use crate::word::{read_word, write_word};

/// Progress observer for long transfers
pub trait TransferProgress {
    /// A transfer of `total_bytes` is starting
    fn started(&mut self, total_bytes: usize);

    /// `bytes_done` of the total have been moved
    fn advanced(&mut self, bytes_done: usize);

    /// The transfer completed
    fn finished(&mut self);
}

/// Progress observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn started(&mut self, _total_bytes: usize) {}
    fn advanced(&mut self, _bytes_done: usize) {}
    fn finished(&mut self) {}
}

/// Reverse the byte order inside every 4-byte word
///
/// A trailing partial word is padded with zeros first, so the result is
/// always a whole number of words.
pub fn swap_words(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(data.len().div_ceil(4) * 4, 0);
    for word in out.chunks_exact_mut(4) {
        word.reverse();
    }
    out
}

/// SPI2AHB session over a transport
pub struct Spi2Ahb<T: Transport> {
    transport: T,
    windows: WindowManager,
    config: ProtocolConfig,
}

impl<T: Transport> Spi2Ahb<T> {
    /// Wrap an already configured transport
    pub fn new(transport: T, config: ProtocolConfig) -> Self {
        Self {
            transport,
            windows: WindowManager::new(),
            config,
        }
    }

    /// Protocol configuration in use
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Mutable access to the protocol configuration
    pub fn config_mut(&mut self) -> &mut ProtocolConfig {
        &mut self.config
    }

    /// Window cache state
    pub fn windows(&self) -> &WindowManager {
        &self.windows
    }

    /// Direct access to the transport
    ///
    /// Traffic issued this way bypasses the window cache; call
    /// [`Spi2Ahb::invalidate_window`] if it may have changed the base.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Forget the cached window base
    pub fn invalidate_window(&mut self) {
        self.windows.invalidate();
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Read the remote window base register
    pub fn read_base(&mut self) -> Result<u32> {
        self.windows.read_base(&mut self.transport, &self.config)
    }

    /// Write one 32-bit value, most significant byte first
    pub fn write_word32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.write_range(addr, &value.to_be_bytes(), false, false)
    }

    /// Read one 32-bit value, most significant byte first
    pub fn read_word32(&mut self, addr: u32) -> Result<u32> {
        let data = self.read_range(addr, 4)?;
        Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// Write `buf` at `addr`
    ///
    /// With `swap_words` the bytes of every word are reversed on the wire.
    /// With `verify` the range is read back and compared afterwards.
    pub fn write_range(
        &mut self,
        addr: u32,
        buf: &[u8],
        swap_words: bool,
        verify: bool,
    ) -> Result<()> {
        self.write_range_with_progress(addr, buf, swap_words, verify, &mut NoProgress)
    }

    /// [`Spi2Ahb::write_range`] with a progress observer
    pub fn write_range_with_progress(
        &mut self,
        addr: u32,
        buf: &[u8],
        swap: bool,
        verify: bool,
        progress: &mut dyn TransferProgress,
    ) -> Result<()> {
        let image: Cow<'_, [u8]> = if swap {
            Cow::Owned(swap_words(buf))
        } else {
            Cow::Borrowed(buf)
        };

        let plan = TransferPlan::new(addr, image.len(), self.config.max_chunk)?;
        if plan.is_empty() {
            return Ok(());
        }

        log::debug!(
            "Writing {} bytes at 0x{:08X} in {} frame(s)",
            image.len(),
            addr,
            plan.frames().len()
        );

        progress.started(image.len());
        let mut done = 0usize;

        for frame in plan.frames() {
            let start = (frame.addr - addr) as usize;
            let mut payload = vec![0u8; frame.class.bytes()];
            payload[..frame.len].copy_from_slice(&image[start..start + frame.len]);

            self.write_frame(frame, &payload)
                .inspect_err(|e| log::error!("write frame at 0x{:08X} failed: {}", frame.addr, e))?;

            done += frame.len;
            progress.advanced(done);
        }

        progress.finished();

        if verify {
            self.verify_range(addr, &image)?;
        }

        Ok(())
    }

    /// Read `len` bytes from `addr`
    pub fn read_range(&mut self, addr: u32, len: usize) -> Result<Vec<u8>> {
        self.read_range_with_progress(addr, len, false, &mut NoProgress)
    }

    /// [`Spi2Ahb::read_range`] with word swapping and a progress observer
    pub fn read_range_with_progress(
        &mut self,
        addr: u32,
        len: usize,
        swap: bool,
        progress: &mut dyn TransferProgress,
    ) -> Result<Vec<u8>> {
        // Swapped reads move whole words
        let wire_len = if swap { len.div_ceil(4) * 4 } else { len };
        let plan = TransferPlan::new(addr, wire_len, self.config.max_chunk)?;
        let mut out = Vec::with_capacity(wire_len);
        if plan.is_empty() {
            return Ok(out);
        }

        progress.started(wire_len);

        for frame in plan.frames() {
            let data = self
                .read_frame(frame)
                .inspect_err(|e| log::error!("read frame at 0x{:08X} failed: {}", frame.addr, e))?;

            if self.config.traces(Trace::DumpTrace) {
                log::info!("dump 0x{:08X}: {}", frame.addr, hex_bytes(&data[..frame.len]));
            }

            out.extend_from_slice(&data[..frame.len]);
            progress.advanced(out.len());
        }

        progress.finished();

        if swap {
            let mut swapped = swap_words(&out);
            swapped.truncate(len);
            return Ok(swapped);
        }
        Ok(out)
    }

    fn write_frame(&mut self, frame: &Frame, payload: &[u8]) -> Result<()> {
        self.windows
            .ensure_window(&mut self.transport, &self.config, frame.addr)?;
        write_word(
            &mut self.transport,
            &self.config,
            window_offset(frame.addr),
            payload,
        )
    }

    fn read_frame(&mut self, frame: &Frame) -> Result<Vec<u8>> {
        self.windows
            .ensure_window(&mut self.transport, &self.config, frame.addr)?;
        read_word(
            &mut self.transport,
            &self.config,
            window_offset(frame.addr),
            frame.class,
        )
    }

    fn verify_range(&mut self, addr: u32, expected: &[u8]) -> Result<()> {
        let actual = self.read_range(addr, expected.len())?;

        let mut mismatches = 0usize;
        let mut first: Option<(usize, u8, u8)> = None;
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            if a != e {
                first.get_or_insert((i, *a, *e));
                mismatches += 1;
            }
        }

        if let Some((i, actual, expected)) = first {
            log::error!(
                "Verify: {} byte(s) differ, first at 0x{:08X}: expected 0x{:02X}, got 0x{:02X}",
                mismatches,
                addr as usize + i,
                expected,
                actual
            );
            return Err(Error::VerifyMismatch(mismatches));
        }

        log::debug!("Verified {} bytes at 0x{:08X}", expected.len(), addr);
        Ok(())
    }
}
