//! Value alignment helpers

/// Align a value up to the AES block size.
#[inline]
pub fn align16(val: u64) -> u64 {
    (val + 15) & !15u64
}

/// Align a value up to an arbitrary power-of-two alignment.
#[inline]
pub fn align(val: u64, alignment: u64) -> u64 {
    (val + alignment - 1) & !alignment.overflowing_sub(1).0
}
