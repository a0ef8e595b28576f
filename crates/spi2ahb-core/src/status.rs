//! Status handshake
//!
//! After a write frame or a read request the remote side needs time to
//! complete the AHB access. The host polls a one byte status register
//! until the ready flag is set.

use bitflags::bitflags;

use crate::command::{encode_status_header, Op};
use crate::config::{hex_bytes, ProtocolConfig, Trace};
use crate::error::{Error, Result};
use crate::transport::Transport;

bitflags! {
    /// Status byte returned by a status query
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// Previous write completed / requested read data is available
        const READY = 1 << 7;
    }
}

impl StatusFlags {
    /// Returns true if the ready flag is set
    pub fn is_ready(self) -> bool {
        self.contains(StatusFlags::READY)
    }
}

/// Issue one status query and return the raw flags
pub fn query_status<T: Transport + ?Sized>(transport: &mut T, op: Op) -> Result<StatusFlags> {
    let cmd = [encode_status_header(op)];
    let reply = transport.exchange(&cmd, 1)?;
    let byte = *reply
        .first()
        .ok_or_else(|| Error::Transport("empty status reply".into()))?;
    Ok(StatusFlags::from_bits_retain(byte))
}

/// Poll until the remote side reports ready for `op`
///
/// Issues at most `config.poll_retries` queries, sleeping
/// `config.poll_delay` between them.
pub fn poll_ready<T: Transport + ?Sized>(
    transport: &mut T,
    op: Op,
    config: &ProtocolConfig,
) -> Result<()> {
    let polls = config.poll_retries.max(1);

    for attempt in 1..=polls {
        let status = query_status(transport, op)?;

        if config.traces(Trace::StatusTrace) {
            log::info!(
                "status {} poll {}: {}",
                op,
                attempt,
                hex_bytes(&[status.bits()])
            );
        } else {
            log::trace!("status {} poll {}: 0x{:02X}", op, attempt, status.bits());
        }

        if status.is_ready() {
            return Ok(());
        }

        if attempt < polls && !config.poll_delay.is_zero() {
            std::thread::sleep(config.poll_delay);
        }
    }

    log::debug!("{} not ready after {} polls", op, polls);
    Err(Error::Timeout { op, polls })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ScriptedTransport;

    #[test]
    fn test_ready_on_first_poll() {
        let mut t = ScriptedTransport::new().reply(&[0x80]);
        poll_ready(&mut t, Op::Write, &ProtocolConfig::no_delay()).unwrap();
        assert_eq!(t.count(), 1);
        assert_eq!(t.sent[0], (vec![0xC0], 1));
    }

    #[test]
    fn test_ready_after_busy_polls() {
        let mut t = ScriptedTransport::new()
            .reply(&[0x00])
            .reply(&[0x7F])
            .reply(&[0x81]);
        poll_ready(&mut t, Op::Read, &ProtocolConfig::no_delay()).unwrap();
        assert_eq!(t.count(), 3);
        assert!(t.sent.iter().all(|(w, _)| w == &[0x40]));
    }

    #[test]
    fn test_timeout_after_exact_poll_count() {
        let mut t = ScriptedTransport::new().with_fill(0x00);
        let config = ProtocolConfig::no_delay().with_poll_retries(7);
        let err = poll_ready(&mut t, Op::Write, &config).unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                op: Op::Write,
                polls: 7
            }
        ));
        assert_eq!(t.count(), 7);
    }

    #[test]
    fn test_default_ceiling_is_ten() {
        let mut t = ScriptedTransport::new();
        let err = poll_ready(&mut t, Op::Read, &ProtocolConfig::no_delay()).unwrap_err();
        assert!(matches!(err, Error::Timeout { polls: 10, .. }));
        assert_eq!(t.count(), 10);
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut t = ScriptedTransport::new();
        t.fail_at = Some(0);
        let err = poll_ready(&mut t, Op::Read, &ProtocolConfig::no_delay()).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
