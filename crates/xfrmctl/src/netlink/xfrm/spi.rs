//! SPI candidate order for `XFRM_MSG_ALLOCSPI`.
//!
//! The kernel answers `ENOENT` when the single requested SPI is taken, so
//! the allocator walks candidates one by one. [`RandomSpi`] visits every
//! value of the range exactly once, starting at a random offset, so
//! concurrent allocators rarely collide and an exhausted range is detected.

use rand::Rng;

/// The reserved "no SPI" value.
pub const INVALID_SPI: u32 = 0;

/// Iterator over every SPI in `min..=max`, starting at a random offset.
#[derive(Debug, Clone)]
pub struct RandomSpi {
    next: u64,
    size: u64,
    min: u32,
    remaining: u64,
}

impl RandomSpi {
    /// Create an iterator over `min..=max` with a random starting point.
    pub fn new(min: u32, max: u32) -> Self {
        let start = rand::thread_rng().gen_range(1..=i32::MAX as u32);
        Self::with_start(min, max, start)
    }

    /// Create an iterator with a fixed starting point.
    pub fn with_start(min: u32, max: u32, start: u32) -> Self {
        let size = if max >= min {
            u64::from(max - min) + 1
        } else {
            0
        };
        Self {
            next: u64::from(start),
            size,
            min,
            remaining: size,
        }
    }

    /// Number of candidates not yet produced.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for RandomSpi {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let offset = self.next % self.size;
        self.next += 1;
        Some(self.min + offset as u32)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, usize::try_from(self.remaining).ok())
    }
}
