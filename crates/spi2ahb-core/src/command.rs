//! SPI2AHB command byte and header encoding
//!
//! Every transaction on the link starts with a command byte:
//!
//! ```text
//!   7      6   5      4   3       2   0
//! +----+--------+-----------+-----------+
//! | op | phase  | wait cyc. | len class |
//! +----+--------+-----------+-----------+
//! ```
//!
//! Write and read-request transactions follow the command byte with a
//! three byte word offset (bits 25..2 of the window-relative address,
//! most significant byte first).

/// Size of one address window in bytes (32 MiB)
pub const WINDOW_SIZE: u32 = 0x0200_0000;

/// Offset of the window base register in the control window
pub const BASE_ADDR_REG: u32 = 0x0200_0004;

/// Size of the write and read-request headers
pub const HEADER_LEN: usize = 4;

const OP_SHIFT: u8 = 7;
const PHASE_SHIFT: u8 = 5;
const PHASE_MASK: u8 = 0x03 << PHASE_SHIFT;
const WAIT_SHIFT: u8 = 3;
const WAIT_MASK: u8 = 0x03 << WAIT_SHIFT;
const CLASS_MASK: u8 = 0x07;

/// Maximum wait cycle count that fits the command byte
pub const MAX_WAIT_CYCLES: u8 = 3;

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Host reads from remote memory
    Read = 0,
    /// Host writes to remote memory
    Write = 1,
}

impl core::fmt::Display for Op {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Op::Read => write!(f, "read"),
            Op::Write => write!(f, "write"),
        }
    }
}

/// Transaction phase (bits 6:5 of the command byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Data transfer
    Data = 0,
    /// Read request (address only)
    ReadRequest = 1,
    /// Status query
    Status = 2,
    /// Dummy read phase
    Dummy = 3,
}

impl Phase {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Phase::Data,
            1 => Phase::ReadRequest,
            2 => Phase::Status,
            _ => Phase::Dummy,
        }
    }
}

/// Data length class of a single transaction
///
/// Only these six payload sizes can be expressed in one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LengthClass {
    /// 4 bytes (one word)
    B4 = 0,
    /// 16 bytes
    B16 = 1,
    /// 32 bytes
    B32 = 2,
    /// 64 bytes
    B64 = 3,
    /// 128 bytes
    B128 = 4,
    /// 256 bytes
    B256 = 5,
}

impl LengthClass {
    /// All classes, smallest first
    pub const ALL: [LengthClass; 6] = [
        LengthClass::B4,
        LengthClass::B16,
        LengthClass::B32,
        LengthClass::B64,
        LengthClass::B128,
        LengthClass::B256,
    ];

    /// Payload size in bytes
    pub const fn bytes(self) -> usize {
        match self {
            LengthClass::B4 => 4,
            LengthClass::B16 => 16,
            LengthClass::B32 => 32,
            LengthClass::B64 => 64,
            LengthClass::B128 => 128,
            LengthClass::B256 => 256,
        }
    }

    /// 3-bit value carried in the command byte
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Exact lookup; `None` if `len` is not a class size
    pub fn from_bytes(len: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.bytes() == len)
    }

    /// Smallest class that holds `len` bytes; `None` above 256
    pub fn round_up(len: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.bytes() >= len)
    }

    /// Largest class no bigger than `len`
    pub fn round_down(len: usize) -> Option<Self> {
        Self::ALL.iter().rev().copied().find(|c| c.bytes() <= len)
    }

    /// Decode the 3-bit class field (6 and 7 are reserved)
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.get((bits & CLASS_MASK) as usize).copied()
    }
}

/// Decoded command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandByte {
    /// Transfer direction
    pub op: Op,
    /// Transaction phase
    pub phase: Phase,
    /// Inter-phase wait cycles (0-3)
    pub wait_cycles: u8,
    /// Payload class, `None` for reserved encodings
    pub class: Option<LengthClass>,
}

impl CommandByte {
    /// Pack the fields into a command byte
    pub fn encode(&self) -> u8 {
        let class = self.class.map(LengthClass::bits).unwrap_or(0);
        command_byte(self.op, self.phase, self.wait_cycles, class)
    }

    /// Split a command byte into its fields
    pub fn decode(byte: u8) -> Self {
        Self {
            op: if byte >> OP_SHIFT == 1 { Op::Write } else { Op::Read },
            phase: Phase::from_bits((byte & PHASE_MASK) >> PHASE_SHIFT),
            wait_cycles: (byte & WAIT_MASK) >> WAIT_SHIFT,
            class: LengthClass::from_bits(byte & CLASS_MASK),
        }
    }
}

fn command_byte(op: Op, phase: Phase, wait_cycles: u8, class: u8) -> u8 {
    ((op as u8) << OP_SHIFT)
        | ((phase as u8) << PHASE_SHIFT)
        | ((wait_cycles.min(MAX_WAIT_CYCLES)) << WAIT_SHIFT)
        | (class & CLASS_MASK)
}

/// Encode a window-relative offset into the three address bytes
pub fn encode_offset(offset: u32) -> [u8; 3] {
    [(offset >> 18) as u8, (offset >> 10) as u8, (offset >> 2) as u8]
}

/// Recover the window-relative offset from the three address bytes
pub fn decode_offset(bytes: [u8; 3]) -> u32 {
    ((bytes[0] as u32) << 18) | ((bytes[1] as u32) << 10) | ((bytes[2] as u32) << 2)
}

fn header(cmd: u8, offset: u32) -> [u8; HEADER_LEN] {
    let addr = encode_offset(offset);
    [cmd, addr[0], addr[1], addr[2]]
}

/// Header of a write transaction; the payload follows immediately
pub fn encode_write_header(offset: u32, class: LengthClass) -> [u8; HEADER_LEN] {
    header(command_byte(Op::Write, Phase::Data, 0, class.bits()), offset)
}

/// Header of a read request (address phase only)
pub fn encode_read_request_header(offset: u32, class: LengthClass) -> [u8; HEADER_LEN] {
    header(
        command_byte(Op::Read, Phase::ReadRequest, 0, class.bits()),
        offset,
    )
}

/// Command byte that clocks out previously requested read data
pub fn encode_read_data_header(class: LengthClass, wait_cycles: u8) -> u8 {
    command_byte(Op::Read, Phase::Data, wait_cycles, class.bits())
}

/// Command byte of a status query for the given direction
pub fn encode_status_header(op: Op) -> u8 {
    command_byte(op, Phase::Status, 0, 0)
}

/// Window base containing `addr`
pub const fn window_base(addr: u32) -> u32 {
    addr & !(WINDOW_SIZE - 1)
}

/// Offset of `addr` inside its window
pub const fn window_offset(addr: u32) -> u32 {
    addr & (WINDOW_SIZE - 1)
}
