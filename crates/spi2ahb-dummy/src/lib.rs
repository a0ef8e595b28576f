//! spi2ahb-dummy - In-memory SPI2AHB peripheral emulator
//!
//! This crate decodes the SPI2AHB command grammar and serves it from a
//! sparse in-memory address space. It's useful for testing the protocol
//! layer and the CLI without real hardware, and it can inject the faults
//! the protocol has to survive (busy status, stuck base register, corrupted
//! writes, dead link).

use std::collections::HashMap;

use spi2ahb_core::command::{decode_offset, CommandByte, LengthClass, Op, Phase, HEADER_LEN};
use spi2ahb_core::status::StatusFlags;
use spi2ahb_core::{Error, Result, Transport, BASE_ADDR_REG, WINDOW_SIZE};

/// Configuration for the emulated peripheral
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Window base register value at power-up
    pub initial_base: u32,
    /// Status polls answered "busy" after each write or read request
    pub busy_polls: u32,
    /// Value of memory that was never written
    pub fill: u8,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            initial_base: 0,
            busy_polls: 0,
            fill: 0xFF,
        }
    }
}

/// Where a decoded offset points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    BaseRegister,
    Control(u32),
    Memory(u32),
}

/// Emulated SPI2AHB peripheral
pub struct DummyBridge {
    config: DummyConfig,
    memory: HashMap<u32, u8>,
    base: u32,
    busy: u32,
    pending_read: Option<Target>,
    exchanges: usize,
    never_ready: bool,
    stuck_base: bool,
    corrupt: Option<(u32, u8)>,
    fail_after: Option<usize>,
}

impl DummyBridge {
    /// Create a new emulated peripheral with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            base: config.initial_base,
            config,
            memory: HashMap::new(),
            busy: 0,
            pending_read: None,
            exchanges: 0,
            never_ready: false,
            stuck_base: false,
            corrupt: None,
            fail_after: None,
        }
    }

    /// Create a new emulated peripheral with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Preload memory at an absolute address
    pub fn load(&mut self, addr: u32, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.memory.insert(addr.wrapping_add(i as u32), b);
        }
    }

    /// Copy of memory at an absolute address
    pub fn memory(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.peek(addr.wrapping_add(i as u32)))
            .collect()
    }

    /// Current window base register value
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Number of exchanges served so far
    pub fn exchange_count(&self) -> usize {
        self.exchanges
    }

    /// Reset the exchange counter
    pub fn reset_exchange_count(&mut self) {
        self.exchanges = 0;
    }

    /// Never raise the ready flag
    pub fn set_never_ready(&mut self, never_ready: bool) {
        self.never_ready = never_ready;
    }

    /// Ignore writes to the base register
    pub fn set_stuck_base(&mut self, stuck: bool) {
        self.stuck_base = stuck;
    }

    /// XOR every byte written to `addr` with `mask`
    pub fn corrupt_writes_at(&mut self, addr: u32, mask: u8) {
        self.corrupt = Some((addr, mask));
    }

    /// Fail every exchange after the next `n`
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after = Some(self.exchanges + n);
    }

    fn peek(&self, addr: u32) -> u8 {
        self.memory.get(&addr).copied().unwrap_or(self.config.fill)
    }

    fn target(&self, addr_bytes: &[u8]) -> Target {
        let offset = decode_offset([addr_bytes[0], addr_bytes[1], addr_bytes[2]]);
        if offset & WINDOW_SIZE != 0 {
            if offset == BASE_ADDR_REG {
                Target::BaseRegister
            } else {
                Target::Control(offset)
            }
        } else {
            Target::Memory(self.base.wrapping_add(offset))
        }
    }

    fn handle_write(&mut self, frame: &[u8], class: LengthClass) -> Result<()> {
        let payload = &frame[HEADER_LEN..];
        if payload.len() != class.bytes() {
            return Err(Error::Transport(format!(
                "write frame carries {} bytes, class expects {}",
                payload.len(),
                class.bytes()
            )));
        }

        match self.target(&frame[1..HEADER_LEN]) {
            Target::BaseRegister => {
                if self.stuck_base {
                    log::debug!("dummy: base register write ignored");
                } else {
                    self.base = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    log::debug!("dummy: base = 0x{:08X}", self.base);
                }
            }
            Target::Control(offset) => {
                log::warn!("dummy: write to unknown control offset 0x{:08X}", offset);
            }
            Target::Memory(addr) => {
                for (i, &b) in payload.iter().enumerate() {
                    let a = addr.wrapping_add(i as u32);
                    let value = match self.corrupt {
                        Some((bad, mask)) if bad == a => b ^ mask,
                        _ => b,
                    };
                    self.memory.insert(a, value);
                }
            }
        }

        self.busy = self.config.busy_polls;
        Ok(())
    }

    fn handle_read_data(&mut self, len: usize) -> Result<Vec<u8>> {
        let target = self
            .pending_read
            .take()
            .ok_or_else(|| Error::Transport("read data without read request".into()))?;

        Ok(match target {
            Target::BaseRegister => {
                let mut data = self.base.to_be_bytes().to_vec();
                data.resize(len, 0);
                data
            }
            Target::Control(_) => vec![0; len],
            Target::Memory(addr) => self.memory(addr, len),
        })
    }

    fn status(&mut self) -> u8 {
        if self.never_ready {
            return 0;
        }
        if self.busy > 0 {
            self.busy -= 1;
            return 0;
        }
        StatusFlags::READY.bits()
    }
}

impl Transport for DummyBridge {
    fn exchange(&mut self, write: &[u8], read_len: usize) -> Result<Vec<u8>> {
        if let Some(limit) = self.fail_after {
            if self.exchanges >= limit {
                return Err(Error::Transport("dummy: link down".into()));
            }
        }
        self.exchanges += 1;

        let first = *write
            .first()
            .ok_or_else(|| Error::Transport("empty frame".into()))?;
        let cmd = CommandByte::decode(first);

        match (cmd.op, cmd.phase) {
            (_, Phase::Status) => Ok(vec![self.status(); read_len]),
            (Op::Write, Phase::Data) => {
                let class = cmd
                    .class
                    .ok_or_else(|| Error::Transport(format!("reserved class in 0x{:02X}", first)))?;
                if write.len() < HEADER_LEN {
                    return Err(Error::Transport("truncated write header".into()));
                }
                self.handle_write(write, class)?;
                Ok(vec![0; read_len])
            }
            (Op::Read, Phase::ReadRequest) => {
                if write.len() != HEADER_LEN {
                    return Err(Error::Transport(format!(
                        "read request is {} bytes, expected {}",
                        write.len(),
                        HEADER_LEN
                    )));
                }
                self.pending_read = Some(self.target(&write[1..]));
                self.busy = self.config.busy_polls;
                Ok(vec![0; read_len])
            }
            (Op::Read, Phase::Data) => self.handle_read_data(read_len),
            _ => Err(Error::Transport(format!(
                "unsupported command byte 0x{:02X}",
                first
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spi2ahb_core::word::{read_word, write_word};
    use spi2ahb_core::{ProtocolConfig, Spi2Ahb, WindowManager};

    fn bridge(dummy: DummyBridge) -> Spi2Ahb<DummyBridge> {
        Spi2Ahb::new(dummy, ProtocolConfig::no_delay())
    }

    #[test]
    fn test_word_roundtrip_every_class() {
        let mut dummy = DummyBridge::new_default();
        let config = ProtocolConfig::no_delay();

        for class in LengthClass::ALL {
            let data: Vec<u8> = (0..class.bytes()).map(|i| (i as u8).wrapping_mul(7)).collect();
            write_word(&mut dummy, &config, 0x400, &data).unwrap();
            let back = read_word(&mut dummy, &config, 0x400, class).unwrap();
            assert_eq!(back, data, "class {:?}", class);
        }
    }

    #[test]
    fn test_range_roundtrip_odd_length() {
        let mut b = bridge(DummyBridge::new_default());
        let data: Vec<u8> = (0..301u32).map(|i| (i * 3) as u8).collect();

        b.write_range(0x0600_0100, &data, false, false).unwrap();
        assert_eq!(b.read_range(0x0600_0100, data.len()).unwrap(), data);

        let dummy = b.into_inner();
        assert_eq!(dummy.base(), 0x0600_0000);
        assert_eq!(dummy.memory(0x0600_0100, data.len()), data);
    }

    #[test]
    fn test_tail_is_zero_padded() {
        let mut b = bridge(DummyBridge::new_default());
        b.write_range(0x100, &[1, 2, 3, 4, 5], false, false).unwrap();

        let dummy = b.into_inner();
        let mut expected = vec![0u8; 16];
        expected[..5].copy_from_slice(&[1, 2, 3, 4, 5]);
        assert_eq!(dummy.memory(0x100, 16), expected);
        // Untouched after the padded frame
        assert_eq!(dummy.memory(0x110, 1), vec![0xFF]);
    }

    #[test]
    fn test_second_ensure_window_is_free() {
        let mut dummy = DummyBridge::new_default();
        let config = ProtocolConfig::no_delay();
        let mut wm = WindowManager::new();

        wm.ensure_window(&mut dummy, &config, 0x0A00_0040).unwrap();
        assert_eq!(dummy.base(), 0x0A00_0000);

        let before = dummy.exchange_count();
        wm.ensure_window(&mut dummy, &config, 0x0A00_0040).unwrap();
        assert_eq!(dummy.exchange_count(), before);
    }

    #[test]
    fn test_consecutive_ranges_reuse_window() {
        let mut b = bridge(DummyBridge::new_default());
        b.write_word32(0x0400_0000, 0x1122_3344).unwrap();
        let after_first = b.transport_mut().exchange_count();

        b.write_word32(0x0400_0004, 0x5566_7788).unwrap();
        // One write frame plus one status poll
        assert_eq!(b.transport_mut().exchange_count() - after_first, 2);
        assert_eq!(b.read_word32(0x0400_0000).unwrap(), 0x1122_3344);
        assert_eq!(b.read_word32(0x0400_0004).unwrap(), 0x5566_7788);
    }

    #[test]
    fn test_boundary_rejected_without_exchanges() {
        let mut b = bridge(DummyBridge::new_default());
        let err = b
            .write_range(0x01FF_FFF8, &[0xAB; 16], false, false)
            .unwrap_err();
        assert!(matches!(err, Error::WindowBoundary { .. }));
        assert_eq!(b.transport_mut().exchange_count(), 0);
    }

    #[test]
    fn test_range_ending_on_window_end() {
        let mut b = bridge(DummyBridge::new_default());
        b.write_range(0x01FF_FFF8, &[9; 8], false, true).unwrap();
        assert_eq!(b.read_range(0x01FF_FFF8, 8).unwrap(), vec![9; 8]);

        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        b.write_range(0x01FF_FC18, &data, false, false).unwrap();
        assert_eq!(b.read_range(0x01FF_FC18, data.len()).unwrap(), data);

        let dummy = b.into_inner();
        // Nothing spilled into the next window
        assert_eq!(dummy.memory(0x0200_0000, 4), vec![0xFF; 4]);
    }

    #[test]
    fn test_verify_counts_corrupted_byte() {
        let mut dummy = DummyBridge::new_default();
        dummy.corrupt_writes_at(0x2010, 0x01);
        let mut b = bridge(dummy);

        let data = vec![0x5A; 64];
        let err = b.write_range(0x2000, &data, false, true).unwrap_err();
        assert!(matches!(err, Error::VerifyMismatch(1)));
    }

    #[test]
    fn test_verify_passes_on_clean_write() {
        let mut b = bridge(DummyBridge::new_default());
        let data: Vec<u8> = (0..200u8).collect();
        b.write_range(0x3000, &data, true, true).unwrap();
    }

    #[test]
    fn test_swap_words_on_device() {
        let mut b = bridge(DummyBridge::new_default());
        b.write_range(0x80, &[1, 2, 3, 4, 5, 6, 7, 8], true, false)
            .unwrap();
        assert_eq!(
            b.transport_mut().memory(0x80, 8),
            vec![4, 3, 2, 1, 8, 7, 6, 5]
        );

        let mut progress = spi2ahb_core::NoProgress;
        let back = b
            .read_range_with_progress(0x80, 8, true, &mut progress)
            .unwrap();
        assert_eq!(back, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_never_ready_times_out_after_retries() {
        let mut dummy = DummyBridge::new_default();
        dummy.set_never_ready(true);
        let config = ProtocolConfig::no_delay().with_poll_retries(4);
        let mut b = Spi2Ahb::new(dummy, config);

        let err = b.read_base().unwrap_err();
        assert!(matches!(err, Error::Timeout { op: Op::Read, polls: 4 }));
        // Read request plus four status polls
        assert_eq!(b.transport_mut().exchange_count(), 5);
    }

    #[test]
    fn test_busy_device_within_retries() {
        let dummy = DummyBridge::new(DummyConfig {
            busy_polls: 3,
            ..DummyConfig::default()
        });
        let mut b = bridge(dummy);
        b.write_range(0x40, &[9; 32], false, true).unwrap();
    }

    #[test]
    fn test_stuck_base_register() {
        let mut dummy = DummyBridge::new_default();
        dummy.set_stuck_base(true);
        let mut b = bridge(dummy);

        let err = b.write_word32(0x0800_0000, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::WindowSwitchFailed {
                base: 0x0800_0000,
                attempts: 3
            }
        ));
        assert_eq!(b.windows().current_base(), None);
        assert_eq!(b.transport_mut().memory(0x0800_0000, 4), vec![0xFF; 4]);
    }

    #[test]
    fn test_link_failure_mid_transfer() {
        let mut dummy = DummyBridge::new_default();
        // Base read (3) plus the first frame and its poll (2)
        dummy.fail_after(5);
        let mut b = bridge(dummy);

        let err = b.write_range(0, &[0x11; 512], false, false).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        let dummy = b.into_inner();
        assert_eq!(dummy.memory(0, 256), vec![0x11; 256]);
        assert_eq!(dummy.memory(256, 1), vec![0xFF]);
    }

    #[test]
    fn test_read_base_display() {
        let dummy = DummyBridge::new(DummyConfig {
            initial_base: 0x1E00_0000,
            ..DummyConfig::default()
        });
        let mut b = bridge(dummy);
        assert_eq!(b.read_base().unwrap(), 0x1E00_0000);
        assert_eq!(b.windows().current_base(), Some(0x1E00_0000));
    }
}
