use std::fmt;
use std::ops::{Add, Sub};

/// Offset from the image base. Kept as u64 so oversized images survive the
/// walk; the snapshot pass warns when a value no longer fits in 32 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rva {
    value: u64,
}

impl Rva {
    pub fn new(value: u64) -> Self {
        Self { value }
    }

    pub fn zero() -> Self {
        Self { value: 0 }
    }

    pub fn from_va(va: u64, base: u64) -> Self {
        Self {
            value: va.wrapping_sub(base),
        }
    }

    pub fn as_u64(&self) -> u64 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn fits_in_u32(&self) -> bool {
        self.value <= u32::MAX as u64
    }

    pub fn offset_from(&self, other: Rva) -> u64 {
        self.value.wrapping_sub(other.value)
    }

    pub fn is_within(&self, start: Rva, size: u64) -> bool {
        self.value >= start.value && self.value < start.value.wrapping_add(size)
    }
}

impl fmt::Display for Rva {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.value)
    }
}

impl fmt::LowerHex for Rva {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.value, f)
    }
}

impl Add<u64> for Rva {
    type Output = Self;
    fn add(self, rhs: u64) -> Self::Output {
        Self {
            value: self.value + rhs,
        }
    }
}

impl Sub<u64> for Rva {
    type Output = Self;
    fn sub(self, rhs: u64) -> Self::Output {
        Self {
            value: self.value - rhs,
        }
    }
}

impl Sub<Rva> for Rva {
    type Output = u64;
    fn sub(self, rhs: Rva) -> Self::Output {
        self.value - rhs.value
    }
}

impl From<u64> for Rva {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Rva> for u64 {
    fn from(rva: Rva) -> Self {
        rva.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_va() {
        let rva = Rva::from_va(0x140001000, 0x140000000);
        assert_eq!(rva.as_u64(), 0x1000);
    }

    #[test]
    fn test_within_range() {
        let start = Rva::new(0x1000);
        assert!(Rva::new(0x1000).is_within(start, 0x200));
        assert!(Rva::new(0x11ff).is_within(start, 0x200));
        assert!(!Rva::new(0x1200).is_within(start, 0x200));
        assert!(!Rva::new(0xfff).is_within(start, 0x200));
    }

    #[test]
    fn test_fits_in_u32() {
        assert!(Rva::new(0xffff_ffff).fits_in_u32());
        assert!(!Rva::new(0x1_0000_0000).fits_in_u32());
    }

    #[test]
    fn test_display_hex() {
        assert_eq!(Rva::new(0x401000).to_string(), "0x401000");
    }
}
