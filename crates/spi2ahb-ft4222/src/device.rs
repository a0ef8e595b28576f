//! FT4222H device implementation
//!
//! The `Ft4222` struct talks to the chip through vendor control requests
//! and bulk transfers, without the proprietary LibFT4222, and implements
//! [`Transport`] so the SPI2AHB protocol can run on top of it.

use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, ControlIn, ControlOut, ControlType, In, Out, Recipient};
use nusb::{Endpoint, Interface, MaybeFuture};
use spi2ahb_core::{Result as CoreResult, Transport};

use crate::error::{Ft4222Error, Result};
use crate::protocol::*;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
const BULK_TIMEOUT: Duration = Duration::from_secs(30);

/// FT4222H USB SPI master
pub struct Ft4222 {
    /// USB interface
    interface: Interface,
    /// Current SPI configuration
    config: SpiConfig,
    /// Selected clock configuration
    clock_config: ClockConfig,
    /// Control interface index (from USB descriptor)
    control_index: u8,
    /// Bulk IN endpoint address
    in_ep: u8,
    /// Bulk OUT endpoint address
    out_ep: u8,
    /// Current I/O lines mode
    io_lines: u8,
}

impl Ft4222 {
    /// Open the first FT4222H with default configuration
    pub fn open() -> Result<Self> {
        Self::open_with_config(SpiConfig::default())
    }

    /// Open the FT4222H selected by `config.index`
    pub fn open_with_config(config: SpiConfig) -> Result<Self> {
        let devices: Vec<_> = nusb::list_devices()
            .wait()
            .map_err(|e| Ft4222Error::OpenFailed(e.to_string()))?
            .filter(|d| d.vendor_id() == FTDI_VID && d.product_id() == FT4222H_PID)
            .collect();

        let device_info = devices
            .get(config.index)
            .ok_or(Ft4222Error::DeviceNotFound)?;

        log::info!(
            "Opening FT4222H #{} at bus {} address {}",
            config.index,
            device_info.busnum(),
            device_info.device_address()
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| Ft4222Error::OpenFailed(e.to_string()))?;

        let config_desc = device
            .active_configuration()
            .map_err(|e| Ft4222Error::OpenFailed(format!("Failed to get config: {}", e)))?;

        // Vendor-specific interface with a bulk endpoint pair
        let mut spi_interface: Option<u8> = None;
        let mut in_ep: Option<u8> = None;
        let mut out_ep: Option<u8> = None;

        for iface in config_desc.interface_alt_settings() {
            if iface.class() == 0xFF || iface.interface_number() == 0 {
                for ep in iface.endpoints() {
                    if ep.transfer_type() == nusb::descriptors::TransferType::Bulk {
                        if ep.direction() == nusb::transfer::Direction::In {
                            in_ep = Some(ep.address());
                        } else {
                            out_ep = Some(ep.address());
                        }
                    }
                }
                if in_ep.is_some() && out_ep.is_some() {
                    spi_interface = Some(iface.interface_number());
                    break;
                }
            }
        }

        let iface_num = spi_interface.ok_or_else(|| {
            Ft4222Error::OpenFailed("Could not find suitable USB interface".to_string())
        })?;
        let in_ep = in_ep
            .ok_or_else(|| Ft4222Error::OpenFailed("Could not find IN endpoint".to_string()))?;
        let out_ep = out_ep
            .ok_or_else(|| Ft4222Error::OpenFailed("Could not find OUT endpoint".to_string()))?;

        log::debug!(
            "Using interface {}, IN EP 0x{:02X}, OUT EP 0x{:02X}",
            iface_num,
            in_ep,
            out_ep
        );

        let interface = device
            .claim_interface(iface_num)
            .wait()
            .map_err(|e| Ft4222Error::ClaimFailed(e.to_string()))?;

        let clock_config = config.clock_config();

        // Control requests go to index 1 when the chip exposes several interfaces
        let control_index = if config_desc.num_interfaces() > 1 { 1 } else { 0 };

        let mut ft4222 = Self {
            interface,
            config,
            clock_config,
            control_index,
            in_ep,
            out_ep,
            io_lines: 1,
        };

        ft4222.init()?;

        Ok(ft4222)
    }

    /// Bring the chip up as SPI master
    fn init(&mut self) -> Result<()> {
        let (chip_version, version2, version3) = self.get_version()?;
        log::info!(
            "FT4222H version: chip=0x{:08X} (0x{:08X} 0x{:08X})",
            chip_version,
            version2,
            version3
        );

        let channels = self.get_num_channels()?;
        if self.config.cs >= channels {
            return Err(Ft4222Error::InvalidParameter(format!(
                "CS{} not available (device has {} channels)",
                self.config.cs, channels
            )));
        }

        self.reset()?;
        self.set_sys_clock(self.clock_config.sys_clock)?;
        self.configure_spi_master()?;

        log::info!(
            "FT4222H configured: SPI clock = {} kHz, CS = {}, I/O mode = {:?}",
            self.clock_config.spi_clock_khz(),
            self.config.cs,
            self.config.io_mode
        );

        Ok(())
    }

    /// Returns (chip_version, version2, version3)
    fn get_version(&self) -> Result<(u32, u32, u32)> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: FT4222_INFO_REQUEST,
                    value: FT4222_GET_VERSION,
                    index: self.control_index as u16,
                    length: 12,
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| Ft4222Error::TransferFailed(format!("Failed to get version: {}", e)))?;

        if data.len() < 12 {
            return Err(Ft4222Error::InvalidResponse(format!(
                "Version response too short: {} < 12",
                data.len()
            )));
        }

        let word = |i: usize| u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        Ok((word(0), word(4), word(8)))
    }

    /// Number of chip select lines, from the mode byte of GET_CONFIG
    fn get_num_channels(&self) -> Result<u8> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: FT4222_INFO_REQUEST,
                    value: FT4222_GET_CONFIG,
                    index: self.control_index as u16,
                    length: 13,
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| Ft4222Error::TransferFailed(format!("Failed to get config: {}", e)))?;

        let mode = *data
            .first()
            .ok_or_else(|| Ft4222Error::InvalidResponse("Empty response for config".into()))?;

        let channels = match mode {
            0 => 1,
            1 => 3,
            2 => 4,
            3 => 1,
            mode => {
                return Err(Ft4222Error::InvalidResponse(format!(
                    "Unknown mode byte: 0x{:02x}",
                    mode
                )))
            }
        };

        log::debug!("FT4222H mode: {}, channels: {}", mode, channels);
        Ok(channels)
    }

    fn reset(&self) -> Result<()> {
        // wIndex is always 0 for the SIO reset
        self.control_out_with_index(FT4222_RESET_REQUEST, FT4222_RESET_SIO, 0, &[])?;
        self.flush();
        log::debug!("FT4222H reset complete");
        Ok(())
    }

    fn flush(&self) {
        for _ in 0..6 {
            if let Err(e) = self.control_out(FT4222_RESET_REQUEST, FT4222_OUTPUT_FLUSH, &[]) {
                log::warn!("FT4222 output flush failed: {}", e);
                break;
            }
        }

        if let Err(e) = self.control_out(FT4222_RESET_REQUEST, FT4222_INPUT_FLUSH, &[]) {
            log::warn!("FT4222 input flush failed: {}", e);
        }
    }

    fn set_sys_clock(&self, clock: SystemClock) -> Result<()> {
        self.config_request(FT4222_SET_CLOCK, clock.index() as u8)?;
        log::debug!("Set system clock to {} MHz", clock.to_khz() / 1000);
        Ok(())
    }

    /// SPI mode 0, active-low CS on the configured line
    fn configure_spi_master(&mut self) -> Result<()> {
        let cs = self.config.cs;

        self.config_request(FT4222_SPI_RESET_TRANSACTION, cs)?;

        self.io_lines = self.config.io_mode.lines();
        self.config_request(FT4222_SPI_SET_IO_LINES, self.io_lines)?;

        self.config_request(
            FT4222_SPI_SET_CLK_DIV,
            self.clock_config.divisor.value() as u8,
        )?;
        self.config_request(FT4222_SPI_SET_CLK_IDLE, FT4222_CLK_IDLE_LOW)?;
        self.config_request(FT4222_SPI_SET_CAPTURE, FT4222_CLK_CAPTURE_LEADING)?;
        self.config_request(FT4222_SPI_SET_CS_ACTIVE, FT4222_CS_ACTIVE_LOW)?;
        self.config_request(FT4222_SPI_SET_CS_MASK, 1 << cs)?;
        self.config_request(FT4222_SET_MODE, FT4222_MODE_SPI_MASTER)?;

        Ok(())
    }

    fn set_io_lines(&mut self, lines: u8) -> Result<()> {
        if lines != self.io_lines {
            self.config_request(FT4222_SPI_SET_IO_LINES, lines)?;
            self.config_request(FT4222_SPI_RESET, FT4222_SPI_RESET_LINE_NUM)?;
            self.io_lines = lines;
            log::trace!("Set I/O lines to {}", lines);
        }
        Ok(())
    }

    fn control_out(&self, request: u8, value: u16, data: &[u8]) -> Result<()> {
        self.control_out_with_index(request, value, self.control_index as u16, data)
    }

    fn control_out_with_index(
        &self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<()> {
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    data,
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| Ft4222Error::TransferFailed(format!("Control transfer failed: {}", e)))?;

        Ok(())
    }

    /// wValue = (data << 8) | cmd, wIndex = control_index
    fn config_request(&self, cmd: u8, data: u8) -> Result<()> {
        let value = ((data as u16) << 8) | (cmd as u16);
        self.control_out(FT4222_CONFIG_REQUEST, value, &[])
    }

    /// An empty write ends the transaction and deasserts CS
    fn bulk_write(&mut self, data: &[u8]) -> Result<()> {
        let mut out_ep: Endpoint<Bulk, Out> = self
            .interface
            .endpoint(self.out_ep)
            .map_err(|e| Ft4222Error::TransferFailed(e.to_string()))?;

        if data.is_empty() {
            out_ep
                .transfer_blocking(Buffer::new(0), BULK_TIMEOUT)
                .into_result()
                .map_err(|e| Ft4222Error::TransferFailed(format!("Empty packet failed: {}", e)))?;
            return Ok(());
        }

        for (i, chunk) in data.chunks(WRITE_CHUNK_SIZE).enumerate() {
            let mut out_buf = Buffer::new(chunk.len());
            out_buf.extend_from_slice(chunk);

            out_ep
                .transfer_blocking(out_buf, BULK_TIMEOUT)
                .into_result()
                .map_err(|e| {
                    Ft4222Error::TransferFailed(format!(
                        "Bulk write failed at offset {}: {}",
                        i * WRITE_CHUNK_SIZE,
                        e
                    ))
                })?;
        }

        log::trace!("Bulk write {} bytes", data.len());
        Ok(())
    }

    fn bulk_read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut in_ep: Endpoint<Bulk, In> = self
            .interface
            .endpoint(self.in_ep)
            .map_err(|e| Ft4222Error::TransferFailed(e.to_string()))?;

        let max_packet_size = in_ep.max_packet_size();
        let mut result = Vec::with_capacity(len);
        let mut remaining = len;

        while remaining > 0 {
            let request_len = std::cmp::min(remaining + MODEM_STATUS_SIZE, READ_BUFFER_SIZE);
            let aligned_len = request_len.div_ceil(max_packet_size) * max_packet_size;

            let mut in_buf = Buffer::new(aligned_len);
            in_buf.set_requested_len(aligned_len);

            let data = in_ep
                .transfer_blocking(in_buf, BULK_TIMEOUT)
                .into_result()
                .map_err(|e| Ft4222Error::TransferFailed(format!("Bulk read failed: {}", e)))?;

            if data.len() < MODEM_STATUS_SIZE {
                return Err(Ft4222Error::InvalidResponse("Response too short".into()));
            }

            // Skip modem status bytes
            let payload = &data[MODEM_STATUS_SIZE..];
            let to_copy = std::cmp::min(payload.len(), remaining);
            result.extend_from_slice(&payload[..to_copy]);
            remaining -= to_copy;
        }

        log::trace!("Bulk read {} bytes", result.len());
        Ok(result)
    }

    /// Full-duplex single-I/O transfer, returns only the read-phase bytes
    fn spi_transfer_single(&mut self, write_data: &[u8], read_len: usize) -> Result<Vec<u8>> {
        self.set_io_lines(1)?;

        let total_len = write_data.len() + read_len;
        if total_len == 0 {
            return Ok(Vec::new());
        }

        let mut out_buf = Vec::with_capacity(total_len);
        out_buf.extend_from_slice(write_data);
        out_buf.resize(total_len, 0x00);

        self.bulk_write(&out_buf)?;
        self.bulk_write(&[])?;

        let response = self.bulk_read(total_len)?;
        if response.len() < total_len {
            return Err(Ft4222Error::InvalidResponse(format!(
                "Expected {} bytes, got {}",
                total_len,
                response.len()
            )));
        }

        Ok(response[write_data.len()..].to_vec())
    }

    /// Half-duplex multi-I/O transfer
    ///
    /// Format: | header | single-I/O phase | multi-I/O write phase | multi-I/O read phase |
    fn spi_transfer_multi(
        &mut self,
        single_data: &[u8],
        multi_write_data: &[u8],
        multi_read_len: usize,
        io_lines: u8,
    ) -> Result<Vec<u8>> {
        if single_data.len() > MULTI_IO_MAX_SINGLE {
            return Err(Ft4222Error::InvalidParameter(format!(
                "Single phase too long: {} > {}",
                single_data.len(),
                MULTI_IO_MAX_SINGLE
            )));
        }
        if multi_write_data.len() > MULTI_IO_MAX_DATA {
            return Err(Ft4222Error::InvalidParameter(format!(
                "Multi-write phase too long: {} > {}",
                multi_write_data.len(),
                MULTI_IO_MAX_DATA
            )));
        }
        if multi_read_len > MULTI_IO_MAX_DATA {
            return Err(Ft4222Error::InvalidParameter(format!(
                "Multi-read phase too long: {} > {}",
                multi_read_len, MULTI_IO_MAX_DATA
            )));
        }

        self.set_io_lines(io_lines)?;

        let header = multi_io_header(single_data.len(), multi_write_data.len(), multi_read_len);
        let mut out_buf =
            Vec::with_capacity(MULTI_IO_HEADER_SIZE + single_data.len() + multi_write_data.len());
        out_buf.extend_from_slice(&header);
        out_buf.extend_from_slice(single_data);
        out_buf.extend_from_slice(multi_write_data);

        self.bulk_write(&out_buf)?;
        self.bulk_write(&[])?;

        if multi_read_len > 0 {
            self.bulk_read(multi_read_len)
        } else {
            Ok(Vec::new())
        }
    }

    /// List all connected FT4222H devices
    pub fn list_devices() -> Result<Vec<Ft4222DeviceInfo>> {
        let devices = nusb::list_devices()
            .wait()
            .map_err(|e| Ft4222Error::OpenFailed(e.to_string()))?
            .filter(|d| d.vendor_id() == FTDI_VID && d.product_id() == FT4222H_PID)
            .enumerate()
            .map(|(index, d)| Ft4222DeviceInfo {
                index,
                bus: d.busnum(),
                address: d.device_address(),
            })
            .collect();

        Ok(devices)
    }

    /// Get the current SPI configuration
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Get the actual SPI clock speed in kHz
    pub fn actual_speed_khz(&self) -> u32 {
        self.clock_config.spi_clock_khz()
    }
}

impl Transport for Ft4222 {
    fn exchange(&mut self, write: &[u8], read_len: usize) -> CoreResult<Vec<u8>> {
        let result = match self.config.io_mode {
            IoMode::Single => self.spi_transfer_single(write, read_len),
            mode => self.spi_transfer_multi(&[], write, read_len, mode.lines()),
        };
        Ok(result?)
    }
}

/// Information about a connected FT4222H device
#[derive(Debug, Clone)]
pub struct Ft4222DeviceInfo {
    /// Value for the `index` option
    pub index: usize,
    /// USB bus number
    pub bus: u8,
    /// USB device address
    pub address: u8,
}

impl std::fmt::Display for Ft4222DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FT4222H #{} at bus {} address {}",
            self.index, self.bus, self.address
        )
    }
}

/// Parse programmer options for FT4222
///
/// Supported options:
/// - `index=<n>`: Which attached FT4222H to use (default: 0)
/// - `div=<n>`: Division of the 80 MHz system clock (default: 128)
/// - `spispeed=<khz>`: Target SPI clock speed in kHz, overrides `div`
/// - `cs=<0-3>`: Which chip select to use (default: 0)
/// - `iomode=<single|dual|quad>`: I/O mode (default: quad)
pub fn parse_options(options: &[(&str, &str)]) -> Result<SpiConfig> {
    let mut config = SpiConfig::default();

    for (key, value) in options {
        match *key {
            "index" => {
                config.index = value.parse().map_err(|_| {
                    Ft4222Error::InvalidParameter(format!("Invalid index value: {}", value))
                })?;
            }
            "div" => {
                config.division = value.parse().map_err(|_| {
                    Ft4222Error::InvalidParameter(format!("Invalid div value: {}", value))
                })?;
            }
            "spispeed" => {
                let khz: u32 = value.parse().map_err(|_| {
                    Ft4222Error::InvalidParameter(format!("Invalid spispeed value: {}", value))
                })?;
                config.speed_khz = Some(khz);
                log::debug!("Setting target SPI speed to {} kHz", khz);
            }
            "cs" => {
                let cs: u8 = value.parse().map_err(|_| {
                    Ft4222Error::InvalidParameter(format!("Invalid cs value: {}", value))
                })?;
                if cs > 3 {
                    return Err(Ft4222Error::InvalidParameter(format!(
                        "Invalid cs: {} (must be 0-3)",
                        cs
                    )));
                }
                config.cs = cs;
            }
            "iomode" => {
                config.io_mode = IoMode::parse(value).ok_or_else(|| {
                    Ft4222Error::InvalidParameter(format!(
                        "Invalid iomode: {} (must be single, dual, or quad)",
                        value
                    ))
                })?;
            }
            _ => {
                log::warn!("Unknown FT4222 option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_defaults() {
        let config = parse_options(&[]).unwrap();
        assert_eq!(config.index, 0);
        assert_eq!(config.cs, 0);
        assert_eq!(config.division, DEFAULT_DIVISION);
        assert_eq!(config.speed_khz, None);
        assert_eq!(config.io_mode, IoMode::Quad);
    }

    #[test]
    fn test_parse_options_all_keys() {
        let config = parse_options(&[
            ("index", "1"),
            ("div", "8"),
            ("cs", "2"),
            ("iomode", "single"),
        ])
        .unwrap();
        assert_eq!(config.index, 1);
        assert_eq!(config.division, 8);
        assert_eq!(config.cs, 2);
        assert_eq!(config.io_mode, IoMode::Single);
        assert_eq!(config.clock_config().spi_clock_khz(), 10_000);

        let config = parse_options(&[("spispeed", "20000")]).unwrap();
        assert_eq!(config.speed_khz, Some(20_000));
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        assert!(matches!(
            parse_options(&[("cs", "4")]),
            Err(Ft4222Error::InvalidParameter(_))
        ));
        assert!(parse_options(&[("div", "fast")]).is_err());
        assert!(parse_options(&[("index", "-1")]).is_err());
        assert!(parse_options(&[("iomode", "octal")]).is_err());
    }

    #[test]
    fn test_error_maps_to_transport() {
        let err: spi2ahb_core::Error = Ft4222Error::DeviceNotFound.into();
        assert!(matches!(err, spi2ahb_core::Error::Transport(msg) if msg.contains("not found")));
    }
}
