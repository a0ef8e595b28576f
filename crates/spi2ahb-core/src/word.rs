//! Word transfer engine
//!
//! One write or read of exactly one length class, addressed by a
//! window-relative offset. This is the atomic unit of the protocol:
//!
//! - write: `| hdr (4) | payload |` then status poll (write)
//! - read: `| req hdr (4) |`, status poll (read), then `| data hdr (1) |`
//!   followed by `class` bytes clocked in

use crate::command::{
    encode_read_data_header, encode_read_request_header, encode_write_header, LengthClass, Op,
    HEADER_LEN,
};
use crate::config::{hex_bytes, ProtocolConfig, Trace};
use crate::error::{Error, Result};
use crate::status::poll_ready;
use crate::transport::Transport;

/// Write one class-sized payload at `offset`
///
/// `buf.len()` must be 4, 16, 32, 64, 128 or 256.
pub fn write_word<T: Transport + ?Sized>(
    transport: &mut T,
    config: &ProtocolConfig,
    offset: u32,
    buf: &[u8],
) -> Result<()> {
    let class = LengthClass::from_bytes(buf.len()).ok_or(Error::InvalidLength(buf.len()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + buf.len());
    frame.extend_from_slice(&encode_write_header(offset, class));
    frame.extend_from_slice(buf);

    if config.traces(Trace::WriteTrace) {
        log::info!("write 0x{:07X}: {}", offset, hex_bytes(&frame));
    } else {
        log::trace!("write frame 0x{:07X} ({} bytes)", offset, buf.len());
    }

    transport.exchange(&frame, 0)?;
    poll_ready(transport, Op::Write, config)
}

/// Read one class-sized payload from `offset`
pub fn read_word<T: Transport + ?Sized>(
    transport: &mut T,
    config: &ProtocolConfig,
    offset: u32,
    class: LengthClass,
) -> Result<Vec<u8>> {
    let request = encode_read_request_header(offset, class);
    if config.traces(Trace::ReadTrace) {
        log::info!("read request 0x{:07X}: {}", offset, hex_bytes(&request));
    } else {
        log::trace!("read request 0x{:07X} ({} bytes)", offset, class.bytes());
    }
    transport.exchange(&request, 0)?;

    poll_ready(transport, Op::Read, config)?;

    let cmd = [encode_read_data_header(class, config.read_wait_cycles)];
    let data = transport.exchange(&cmd, class.bytes())?;
    if data.len() != class.bytes() {
        return Err(Error::Transport(format!(
            "short read at offset 0x{:07X}: expected {} bytes, got {}",
            offset,
            class.bytes(),
            data.len()
        )));
    }

    if config.traces(Trace::ReadTrace) {
        log::info!("read data 0x{:07X}: {}", offset, hex_bytes(&data));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ScriptedTransport;

    #[test]
    fn test_write_word_frame_layout() {
        let mut t = ScriptedTransport::new().reply(&[0x80]);
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        write_word(&mut t, &ProtocolConfig::no_delay(), 0x10, &payload).unwrap();

        assert_eq!(t.count(), 2);
        assert_eq!(
            t.sent[0],
            (vec![0x80, 0x00, 0x00, 0x04, 0xDE, 0xAD, 0xBE, 0xEF], 0)
        );
        // Write status query
        assert_eq!(t.sent[1], (vec![0xC0], 1));
    }

    #[test]
    fn test_write_word_rejects_bad_length_without_traffic() {
        let mut t = ScriptedTransport::new();
        let err = write_word(&mut t, &ProtocolConfig::no_delay(), 0, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, Error::InvalidLength(8)));
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn test_read_word_sequence() {
        let data: Vec<u8> = (0..16).collect();
        let mut t = ScriptedTransport::new().reply(&[0x80]).reply(&data);
        let config = ProtocolConfig::no_delay().with_read_wait_cycles(1);
        let out = read_word(&mut t, &config, 0x100, LengthClass::B16).unwrap();

        assert_eq!(out, data);
        assert_eq!(t.count(), 3);
        assert_eq!(t.sent[0], (vec![0x21, 0x00, 0x00, 0x40], 0));
        assert_eq!(t.sent[1], (vec![0x40], 1));
        assert_eq!(t.sent[2], (vec![0x09], 16));
    }

    #[test]
    fn test_read_word_timeout_skips_data_phase() {
        let mut t = ScriptedTransport::new();
        let config = ProtocolConfig::no_delay().with_poll_retries(2);
        let err = read_word(&mut t, &config, 0, LengthClass::B4).unwrap_err();
        assert!(matches!(err, Error::Timeout { op: Op::Read, .. }));
        // Request plus two polls, no data phase
        assert_eq!(t.count(), 3);
    }

    #[test]
    fn test_read_word_short_reply() {
        let mut t = ScriptedTransport::new().reply(&[0x80]).reply(&[1, 2]);
        let err = read_word(&mut t, &ProtocolConfig::no_delay(), 0, LengthClass::B4).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
