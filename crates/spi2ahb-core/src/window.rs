//! Window base management
//!
//! Only one 32 MiB window of the remote address space is reachable at a
//! time. The window is selected by a base register in the control window.
//! The manager caches the last base the device confirmed so consecutive
//! accesses to the same window cost no extra bus traffic.

use crate::command::{window_base, LengthClass, BASE_ADDR_REG};
use crate::config::{ProtocolConfig, WINDOW_SWITCH_ATTEMPTS};
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::word::{read_word, write_word};

/// Owner of the cached window base
#[derive(Debug, Default)]
pub struct WindowManager {
    current_base: Option<u32>,
}

impl WindowManager {
    /// Create a manager with no cached base; the first access resyncs
    pub fn new() -> Self {
        Self::default()
    }

    /// Last base the device confirmed, if any
    pub fn current_base(&self) -> Option<u32> {
        self.current_base
    }

    /// Forget the cached base
    pub fn invalidate(&mut self) {
        self.current_base = None;
    }

    /// Read the base register and refresh the cache with its value
    pub fn read_base<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        config: &ProtocolConfig,
    ) -> Result<u32> {
        let base = read_base_register(transport, config)?;
        self.current_base = Some(base);
        Ok(base)
    }

    /// Make sure the window holding `addr` is selected on the device
    pub fn ensure_window<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        config: &ProtocolConfig,
        addr: u32,
    ) -> Result<()> {
        let target = window_base(addr);
        if self.current_base == Some(target) {
            return Ok(());
        }

        let remote = read_base_register(transport, config)?;
        if remote == target {
            log::debug!("Window base already 0x{:08X}", target);
            self.current_base = Some(target);
            return Ok(());
        }

        log::debug!("Switching window base 0x{:08X} -> 0x{:08X}", remote, target);

        for attempt in 1..=WINDOW_SWITCH_ATTEMPTS {
            write_word(transport, config, BASE_ADDR_REG, &target.to_be_bytes())?;

            if !config.settle_delay.is_zero() {
                std::thread::sleep(config.settle_delay);
            }

            let readback = read_base_register(transport, config)?;
            if readback == target {
                self.current_base = Some(target);
                return Ok(());
            }

            log::warn!(
                "Window base readback 0x{:08X} != 0x{:08X} (attempt {}/{})",
                readback,
                target,
                attempt,
                WINDOW_SWITCH_ATTEMPTS
            );
        }

        Err(Error::WindowSwitchFailed {
            base: target,
            attempts: WINDOW_SWITCH_ATTEMPTS,
        })
    }
}

fn read_base_register<T: Transport + ?Sized>(
    transport: &mut T,
    config: &ProtocolConfig,
) -> Result<u32> {
    let data = read_word(transport, config, BASE_ADDR_REG, LengthClass::B4)?;
    Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ScriptedTransport;

    const READY: [u8; 1] = [0x80];

    /// Script one successful base register read returning `base`
    fn base_read(t: ScriptedTransport, base: u32) -> ScriptedTransport {
        t.reply(&READY).reply(&base.to_be_bytes())
    }

    #[test]
    fn test_cache_hit_has_no_traffic() {
        let mut t = base_read(ScriptedTransport::new(), 0x0400_0000);
        let mut wm = WindowManager::new();
        let config = ProtocolConfig::no_delay();

        wm.ensure_window(&mut t, &config, 0x0400_1000).unwrap();
        let after_first = t.count();
        assert_eq!(after_first, 3);

        wm.ensure_window(&mut t, &config, 0x0400_1000).unwrap();
        wm.ensure_window(&mut t, &config, 0x05FF_FFFC).unwrap();
        assert_eq!(t.count(), after_first);
        assert_eq!(wm.current_base(), Some(0x0400_0000));
    }

    #[test]
    fn test_switch_writes_big_endian_base() {
        let t = base_read(ScriptedTransport::new(), 0);
        // write status, then confirming read
        let t = t.reply(&READY);
        let mut t = base_read(t, 0x1200_0000);
        let mut wm = WindowManager::new();

        wm.ensure_window(&mut t, &ProtocolConfig::no_delay(), 0x1234_5678)
            .unwrap();
        assert_eq!(wm.current_base(), Some(0x1200_0000));

        // read (3 exchanges), write + poll (2), read (3)
        assert_eq!(t.count(), 8);
        assert_eq!(
            t.sent[3].0,
            vec![0x80, 0x80, 0x00, 0x01, 0x12, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_switch_fails_after_three_rounds() {
        // One read for the initial ensure, one before the switch rounds
        let mut t = base_read(ScriptedTransport::new(), 0x0200_0000);
        t = base_read(t, 0x0200_0000);
        for _ in 0..WINDOW_SWITCH_ATTEMPTS {
            t = base_read(t.reply(&READY), 0x0200_0000);
        }
        let mut wm = WindowManager::new();
        let config = ProtocolConfig::no_delay();

        // Establish a confirmed base first
        wm.ensure_window(&mut t, &config, 0x0200_0010).unwrap();
        assert_eq!(wm.current_base(), Some(0x0200_0000));

        let err = wm.ensure_window(&mut t, &config, 0x0800_0000).unwrap_err();
        assert!(matches!(
            err,
            Error::WindowSwitchFailed {
                base: 0x0800_0000,
                attempts: 3
            }
        ));
        // Cache still reflects the last confirmed state
        assert_eq!(wm.current_base(), Some(0x0200_0000));
    }

    #[test]
    fn test_transport_error_leaves_cache() {
        let mut t = ScriptedTransport::new();
        t.fail_at = Some(0);
        let mut wm = WindowManager::new();
        let err = wm
            .ensure_window(&mut t, &ProtocolConfig::no_delay(), 0)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(wm.current_base(), None);
    }

    #[test]
    fn test_read_base_refreshes_cache() {
        let mut t = base_read(ScriptedTransport::new(), 0x0600_0000);
        let mut wm = WindowManager::new();
        let config = ProtocolConfig::no_delay();
        assert_eq!(wm.read_base(&mut t, &config).unwrap(), 0x0600_0000);
        assert_eq!(wm.current_base(), Some(0x0600_0000));

        wm.invalidate();
        assert_eq!(wm.current_base(), None);
    }
}
