//! FT4222H protocol constants and helpers
//!
//! USB request codes and configuration structures for driving the FT4222H
//! SPI master directly over vendor control and bulk transfers.

// ============================================================================
// USB device identifiers
// ============================================================================

/// FTDI vendor ID
pub const FTDI_VID: u16 = 0x0403;
/// FT4222H product ID
pub const FT4222H_PID: u16 = 0x601C;

// ============================================================================
// Vendor requests
// ============================================================================

/// USB request codes for FT4222H
pub const FT4222_RESET_REQUEST: u8 = 0x00;
pub const FT4222_INFO_REQUEST: u8 = 0x20;
pub const FT4222_CONFIG_REQUEST: u8 = 0x21;

/// Reset command values (wValue for RESET_REQUEST)
pub const FT4222_RESET_SIO: u16 = 0x0000;
pub const FT4222_OUTPUT_FLUSH: u16 = 0x0001;
pub const FT4222_INPUT_FLUSH: u16 = 0x0002;

/// Info command values (wValue for INFO_REQUEST)
pub const FT4222_GET_VERSION: u16 = 0x0000;
pub const FT4222_GET_CONFIG: u16 = 0x0001;

/// Config command codes (lower byte of wValue for CONFIG_REQUEST)
/// The data byte goes in the upper byte: wValue = (data << 8) | cmd
pub const FT4222_SET_CLOCK: u8 = 0x04;
pub const FT4222_SET_MODE: u8 = 0x05;
pub const FT4222_SPI_SET_IO_LINES: u8 = 0x42;
pub const FT4222_SPI_SET_CS_ACTIVE: u8 = 0x43;
pub const FT4222_SPI_SET_CLK_DIV: u8 = 0x44;
pub const FT4222_SPI_SET_CLK_IDLE: u8 = 0x45;
pub const FT4222_SPI_SET_CAPTURE: u8 = 0x46;
pub const FT4222_SPI_SET_CS_MASK: u8 = 0x48;
pub const FT4222_SPI_RESET_TRANSACTION: u8 = 0x49;
pub const FT4222_SPI_RESET: u8 = 0x4A;

/// SPI reset type: reset line number after changing I/O lines
pub const FT4222_SPI_RESET_LINE_NUM: u8 = 1;

/// Mode values (data byte for SET_MODE)
pub const FT4222_MODE_SPI_MASTER: u8 = 3;

/// SPI mode 0: clock idles low, capture on leading edge
pub const FT4222_CLK_IDLE_LOW: u8 = 0;
pub const FT4222_CLK_CAPTURE_LEADING: u8 = 0;

/// CS polarity (data byte for SPI_SET_CS_ACTIVE)
pub const FT4222_CS_ACTIVE_LOW: u8 = 0;

// ============================================================================
// Buffer and transfer sizes
// ============================================================================

/// Modem status bytes at the start of each IN packet
pub const MODEM_STATUS_SIZE: usize = 2;

/// Read buffer size per bulk IN transfer
pub const READ_BUFFER_SIZE: usize = 2048;

/// Largest bulk OUT transfer
pub const WRITE_CHUNK_SIZE: usize = 2048;

/// Default clock division (80 MHz / 128 = 625 kHz)
pub const DEFAULT_DIVISION: u32 = 128;

// ============================================================================
// Multi-I/O header format
// ============================================================================

/// Multi-I/O header size (5 bytes)
/// Format: | 4-bit 0x8 | 4-bit single_len | 2B multi_write_len | 2B multi_read_len |
pub const MULTI_IO_HEADER_SIZE: usize = 5;

/// Multi-I/O header magic nibble
pub const MULTI_IO_MAGIC: u8 = 0x80;

/// Maximum single-I/O bytes in multi-I/O command (4 bits = 0-15)
pub const MULTI_IO_MAX_SINGLE: usize = 15;

/// Maximum multi-I/O bytes in each direction (16 bits = 0-65535)
pub const MULTI_IO_MAX_DATA: usize = 65535;

/// Build the multi-I/O transaction header
///
/// Lengths must already be checked against the field widths.
pub fn multi_io_header(
    single_len: usize,
    multi_write_len: usize,
    multi_read_len: usize,
) -> [u8; MULTI_IO_HEADER_SIZE] {
    [
        MULTI_IO_MAGIC | (single_len as u8 & 0x0F),
        (multi_write_len & 0xFF) as u8,
        ((multi_write_len >> 8) & 0xFF) as u8,
        (multi_read_len & 0xFF) as u8,
        ((multi_read_len >> 8) & 0xFF) as u8,
    ]
}

// ============================================================================
// Clock configuration
// ============================================================================

/// System clock options (base frequencies)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemClock {
    /// 60 MHz system clock
    Clock60MHz = 0,
    /// 24 MHz system clock
    Clock24MHz = 1,
    /// 48 MHz system clock
    Clock48MHz = 2,
    /// 80 MHz system clock
    Clock80MHz = 3,
}

impl SystemClock {
    /// Get the frequency in kHz
    pub fn to_khz(self) -> u32 {
        match self {
            SystemClock::Clock60MHz => 60_000,
            SystemClock::Clock24MHz => 24_000,
            SystemClock::Clock48MHz => 48_000,
            SystemClock::Clock80MHz => 80_000,
        }
    }

    /// Get the register index value
    pub fn index(self) -> u16 {
        self as u16
    }
}

/// SPI clock divisor (power of 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDivisor {
    /// No division
    Div1 = 0,
    /// Divide by 2
    Div2 = 1,
    /// Divide by 4
    Div4 = 2,
    /// Divide by 8
    Div8 = 3,
    /// Divide by 16
    Div16 = 4,
    /// Divide by 32
    Div32 = 5,
    /// Divide by 64
    Div64 = 6,
    /// Divide by 128
    Div128 = 7,
    /// Divide by 256
    Div256 = 8,
    /// Divide by 512
    Div512 = 9,
}

impl ClockDivisor {
    const ALL: [ClockDivisor; 10] = [
        ClockDivisor::Div1,
        ClockDivisor::Div2,
        ClockDivisor::Div4,
        ClockDivisor::Div8,
        ClockDivisor::Div16,
        ClockDivisor::Div32,
        ClockDivisor::Div64,
        ClockDivisor::Div128,
        ClockDivisor::Div256,
        ClockDivisor::Div512,
    ];

    /// Get the actual divisor value
    pub fn divisor(self) -> u32 {
        1 << (self as u32)
    }

    /// Get the register value
    pub fn value(self) -> u16 {
        self as u16
    }

    /// Map a requested division onto a supported divisor
    ///
    /// 0 and 1 select no division. Other values round down to the nearest
    /// power of two between 2 and 512. The flag is false when the request
    /// was not exactly representable.
    pub fn from_division(division: u32) -> (Self, bool) {
        if division <= 1 {
            return (ClockDivisor::Div1, true);
        }

        let mut best = ClockDivisor::Div2;
        for d in Self::ALL.into_iter().skip(1) {
            if d.divisor() <= division {
                best = d;
            }
        }
        (best, best.divisor() == division)
    }
}

/// Complete clock configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// System clock selection
    pub sys_clock: SystemClock,
    /// Clock divisor
    pub divisor: ClockDivisor,
}

impl ClockConfig {
    /// Calculate the resulting SPI clock frequency in kHz
    pub fn spi_clock_khz(&self) -> u32 {
        self.sys_clock.to_khz() / self.divisor.divisor()
    }
}

/// Find the best clock configuration for a target speed
///
/// Returns the configuration that gives the highest speed not exceeding
/// target_khz, or the slowest one if nothing fits.
pub fn find_clock_config(target_khz: u32) -> ClockConfig {
    const SYS_CLOCKS: [SystemClock; 4] = [
        SystemClock::Clock80MHz,
        SystemClock::Clock60MHz,
        SystemClock::Clock48MHz,
        SystemClock::Clock24MHz,
    ];

    let mut best: Option<ClockConfig> = None;
    let mut best_khz: u32 = 0;

    for &sys_clock in &SYS_CLOCKS {
        for divisor in ClockDivisor::ALL.into_iter().skip(1) {
            let speed = sys_clock.to_khz() / divisor.divisor();
            if speed <= target_khz && speed > best_khz {
                best = Some(ClockConfig { sys_clock, divisor });
                best_khz = speed;
            }
        }
    }

    best.unwrap_or(ClockConfig {
        sys_clock: SystemClock::Clock24MHz,
        divisor: ClockDivisor::Div512,
    })
}

/// Clock configuration for a raw division of the 80 MHz system clock
pub fn division_clock_config(division: u32) -> ClockConfig {
    let (divisor, exact) = ClockDivisor::from_division(division);
    if !exact {
        log::warn!(
            "FT4222 SPI clock does not support division {}, using {}",
            division,
            divisor.divisor()
        );
    }
    ClockConfig {
        sys_clock: SystemClock::Clock80MHz,
        divisor,
    }
}

// ============================================================================
// I/O mode configuration
// ============================================================================

/// I/O mode for SPI transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    /// Single I/O, full duplex
    Single = 1,
    /// Dual I/O
    Dual = 2,
    /// Quad I/O
    #[default]
    Quad = 4,
}

impl IoMode {
    /// Get the number of I/O lines
    pub fn lines(self) -> u8 {
        self as u8
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "single" | "1" => Some(IoMode::Single),
            "dual" | "2" => Some(IoMode::Dual),
            "quad" | "4" => Some(IoMode::Quad),
            _ => None,
        }
    }
}

// ============================================================================
// SPI configuration
// ============================================================================

/// Complete SPI configuration for FT4222H
#[derive(Debug, Clone)]
pub struct SpiConfig {
    /// Which attached FT4222H to open (0-indexed)
    pub index: usize,
    /// Chip select number (0-3)
    pub cs: u8,
    /// Division of the 80 MHz system clock
    pub division: u32,
    /// Target SPI speed in kHz, overrides `division` when set
    pub speed_khz: Option<u32>,
    /// I/O mode (single/dual/quad)
    pub io_mode: IoMode,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            index: 0,
            cs: 0,
            division: DEFAULT_DIVISION,
            speed_khz: None,
            io_mode: IoMode::default(),
        }
    }
}

impl SpiConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the nth attached device
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Set the chip select number
    pub fn with_cs(mut self, cs: u8) -> Self {
        self.cs = cs;
        self
    }

    /// Set the clock division
    pub fn with_division(mut self, division: u32) -> Self {
        self.division = division;
        self
    }

    /// Set the SPI speed in kHz
    pub fn with_speed_khz(mut self, speed: u32) -> Self {
        self.speed_khz = Some(speed);
        self
    }

    /// Set the I/O mode
    pub fn with_io_mode(mut self, mode: IoMode) -> Self {
        self.io_mode = mode;
        self
    }

    /// Resolve the clock settings this configuration asks for
    pub fn clock_config(&self) -> ClockConfig {
        match self.speed_khz {
            Some(khz) => find_clock_config(khz),
            None => division_clock_config(self.division),
        }
    }
}
