//! Transport abstraction
//!
//! The protocol layer only needs one primitive from the bridge chip: write
//! a byte sequence and then clock in a number of bytes, all while the chip
//! select is held. Everything else (clocking, I/O lines, chip select) is
//! configured when the backend is opened.

use crate::error::Result;

/// One SPI exchange per call
pub trait Transport {
    /// Write `write`, then read `read_len` bytes in the same transaction
    ///
    /// Write-only transactions pass `read_len == 0` and get an empty vector
    /// back. Implementations report any failure as [`crate::Error::Transport`].
    fn exchange(&mut self, write: &[u8], read_len: usize) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, write: &[u8], read_len: usize) -> Result<Vec<u8>> {
        (**self).exchange(write, read_len)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, write: &[u8], read_len: usize) -> Result<Vec<u8>> {
        (**self).exchange(write, read_len)
    }
}
