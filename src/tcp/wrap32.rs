use std::cmp::Ordering;
use std::ops::Add;

use rand::Rng;

/// A 32-bit sequence number, wrapped around a zero point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wrap32 {
    value: u32,
}

impl Wrap32 {
    const WRAP_SIZE: u64 = 1 << 32;

    pub fn new(value: u32) -> Self {
        Wrap32 { value }
    }

    /// A fresh random sequence number, for choosing an ISN
    pub fn random() -> Self {
        Wrap32::new(rand::thread_rng().gen())
    }

    /// The raw 32-bit representation
    pub fn raw(&self) -> u32 {
        self.value
    }

    /// Wrap an absolute `seq_no` given an `initial seq_no`
    pub fn wrap(n: u64, isn: Wrap32) -> Self {
        Wrap32::new((n + isn.value as u64) as u32)
    }

    /// Unwrap to the absolute `seq_no` closest to the `checkpoint`.
    ///
    /// When the two neighboring candidates are equidistant, the result
    /// depends on which side of the checkpoint the in-block candidate fell:
    /// below it, the higher candidate wins; above it, the lower one does,
    /// unless subtracting a full wrap would underflow.
    pub fn unwrap(&self, isn: Wrap32, checkpoint: u64) -> u64 {
        let relative = self.value.wrapping_sub(isn.value) as u64;
        let candidate = (checkpoint / Self::WRAP_SIZE) * Self::WRAP_SIZE + relative;

        match candidate.cmp(&checkpoint) {
            Ordering::Equal => candidate,
            Ordering::Less => {
                let dist_low = checkpoint - candidate;
                let dist_high = candidate + Self::WRAP_SIZE - checkpoint;
                if dist_low < dist_high {
                    candidate
                } else {
                    candidate + Self::WRAP_SIZE
                }
            }
            Ordering::Greater => {
                let dist_high = candidate - checkpoint;
                let dist_low = checkpoint + Self::WRAP_SIZE - candidate;
                if dist_high < dist_low || candidate < Self::WRAP_SIZE {
                    candidate
                } else {
                    candidate - Self::WRAP_SIZE
                }
            }
        }
    }
}

impl Add for Wrap32 {
    type Output = Wrap32;

    fn add(self, other: Wrap32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(other.value))
    }
}

// -- Unit tests --
