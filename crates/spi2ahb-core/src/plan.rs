//! Transfer planning
//!
//! Splits `(addr, len)` into frames the word engine can carry. Each frame
//! holds at most the configured ceiling and is padded up to the next
//! length class. Near the end of a window the frame shrinks to the largest
//! class left in the window, so padding never leaves it. All range checks
//! happen here, before any bus traffic.

use crate::command::{window_base, LengthClass, WINDOW_SIZE};
use crate::error::{Error, Result};

/// One frame of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Absolute start address
    pub addr: u32,
    /// Caller bytes carried by this frame
    pub len: usize,
    /// Class used on the wire (`class.bytes() >= len`)
    pub class: LengthClass,
}

impl Frame {
    /// Zero padding appended to the caller bytes
    pub fn padding(&self) -> usize {
        self.class.bytes() - self.len
    }
}

/// Ordered frames covering a range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    addr: u32,
    len: usize,
    frames: Vec<Frame>,
}

impl TransferPlan {
    /// Plan a transfer of `len` bytes at `addr` with frames of at most `ceiling`
    pub fn new(addr: u32, len: usize, ceiling: LengthClass) -> Result<Self> {
        if len == 0 {
            return Ok(Self {
                addr,
                len,
                frames: Vec::new(),
            });
        }

        if addr % 4 != 0 {
            return Err(Error::Misaligned(addr));
        }

        let end = addr as u64 + len as u64;
        if end > 1u64 << 32 {
            return Err(Error::AddressOutOfRange { addr, len });
        }

        let last = (end - 1) as u32;
        if window_base(addr) != window_base(last) {
            return Err(Error::WindowBoundary { addr, len });
        }
        let window_end = window_base(addr) as u64 + WINDOW_SIZE as u64;

        let step = ceiling.bytes();
        let mut frames = Vec::with_capacity(len.div_ceil(step));
        let mut done = 0usize;

        while done < len {
            let frame_addr = addr + done as u32;
            let room = (window_end - frame_addr as u64) as usize;
            let mut chunk = step.min(len - done);
            // chunk <= 256, so a class always exists
            let mut class = LengthClass::round_up(chunk).ok_or(Error::InvalidLength(chunk))?;

            if class.bytes() > room {
                // room is a nonzero multiple of 4 here
                class = LengthClass::round_down(room).ok_or(Error::WindowBoundary { addr, len })?;
                chunk = chunk.min(class.bytes());
            }

            frames.push(Frame {
                addr: frame_addr,
                len: chunk,
                class,
            });
            done += chunk;
        }

        Ok(Self { addr, len, frames })
    }

    /// Start address
    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// Total caller bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing needs to be transferred
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in transfer order
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_splits_at_ceiling() {
        let plan = TransferPlan::new(0x1000, 600, LengthClass::B256).unwrap();
        let frames = plan.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].addr, 0x1000);
        assert_eq!(frames[0].class, LengthClass::B256);
        assert_eq!(frames[1].addr, 0x1100);
        assert_eq!(frames[2].addr, 0x1200);
        assert_eq!(frames[2].len, 88);
        assert_eq!(frames[2].class, LengthClass::B128);
        assert_eq!(frames[2].padding(), 40);
    }

    #[test]
    fn test_plan_small_ceiling() {
        let plan = TransferPlan::new(0, 300, LengthClass::B128).unwrap();
        let lens: Vec<usize> = plan.frames().iter().map(|f| f.len).collect();
        assert_eq!(lens, vec![128, 128, 44]);
        assert_eq!(plan.frames()[2].class, LengthClass::B64);
    }

    #[test]
    fn test_plan_rounds_tail_up() {
        let plan = TransferPlan::new(0x20, 5, LengthClass::B256).unwrap();
        assert_eq!(plan.frames().len(), 1);
        assert_eq!(plan.frames()[0].class, LengthClass::B16);
    }

    #[test]
    fn test_plan_empty() {
        let plan = TransferPlan::new(0x3, 0, LengthClass::B256).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_rejects_window_crossing() {
        let err = TransferPlan::new(0x01FF_FFF8, 16, LengthClass::B256).unwrap_err();
        assert!(matches!(
            err,
            Error::WindowBoundary {
                addr: 0x01FF_FFF8,
                len: 16
            }
        ));
    }

    #[test]
    fn test_plan_allows_ending_on_boundary() {
        let plan = TransferPlan::new(0x01FF_FFF0, 16, LengthClass::B256).unwrap();
        assert_eq!(plan.frames().len(), 1);
    }

    fn assert_inside_window(plan: &TransferPlan) {
        let covered: usize = plan.frames().iter().map(|f| f.len).sum();
        assert_eq!(covered, plan.len());
        for f in plan.frames() {
            assert!(f.addr as u64 + f.class.bytes() as u64 <= 0x0200_0000);
        }
    }

    #[test]
    fn test_plan_shrinks_tail_at_window_end() {
        let plan = TransferPlan::new(0x01FF_FFF8, 8, LengthClass::B256).unwrap();
        let classes: Vec<LengthClass> = plan.frames().iter().map(|f| f.class).collect();
        assert_eq!(classes, vec![LengthClass::B4, LengthClass::B4]);
        assert_inside_window(&plan);
    }

    #[test]
    fn test_plan_long_range_ending_on_boundary() {
        let plan = TransferPlan::new(0x01FF_FC18, 1000, LengthClass::B256).unwrap();
        assert_inside_window(&plan);

        let frames = plan.frames();
        assert_eq!(frames[3].addr, 0x01FF_FF18);
        assert_eq!(frames[3].class, LengthClass::B128);
        let last = frames[frames.len() - 1];
        assert_eq!(last.addr + last.class.bytes() as u32, 0x0200_0000);
    }

    #[test]
    fn test_plan_pads_short_tail_inside_window() {
        // 6 bytes with 8 left in the window: one word, then a padded word
        let plan = TransferPlan::new(0x01FF_FFF8, 6, LengthClass::B256).unwrap();
        let lens: Vec<usize> = plan.frames().iter().map(|f| f.len).collect();
        assert_eq!(lens, vec![4, 2]);
        assert_eq!(plan.frames()[1].padding(), 2);
        assert_inside_window(&plan);
    }

    #[test]
    fn test_plan_rejects_misaligned() {
        let err = TransferPlan::new(0x1002, 4, LengthClass::B256).unwrap_err();
        assert!(matches!(err, Error::Misaligned(0x1002)));
    }

    #[test]
    fn test_plan_rejects_overflow() {
        let err = TransferPlan::new(0xFFFF_FFFC, 8, LengthClass::B256).unwrap_err();
        assert!(matches!(err, Error::AddressOutOfRange { .. }));

        let plan = TransferPlan::new(0xFFFF_FFFC, 4, LengthClass::B256).unwrap();
        assert_eq!(plan.frames().len(), 1);
    }
}
