//! Unversioned property header: skip/keep fragments plus a zero bitmask

use std::io::{Read, Seek};

use bitvec::prelude::*;

use crate::archive::RawArchive;
use crate::error::Error;

/// Fragments after which a header is considered runaway, likely
/// delta-serialized or corrupt data
pub const MAX_FRAGMENTS: usize = 50;

/// Unversioned header fragment
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UnversionedHeaderFragment {
    /// Number of schema slots to skip before the values
    pub skip_num: u8,
    /// Number of subsequent property values stored
    pub value_num: u8,
    /// Is this the last header fragment?
    pub is_last: bool,
    /// Do the values have zero-mask bits?
    pub has_zeros: bool,
}

impl UnversionedHeaderFragment {
    const SKIP_NUM_MASK: u16 = 0x007f;
    const HAS_ZEROS_MASK: u16 = 0x0080;
    const IS_LAST_MASK: u16 = 0x0100;
    const VALUE_NUM_SHIFT: u16 = 9;

    /// Read an `UnversionedHeaderFragment` from an archive
    pub fn read<C: Read + Seek>(archive: &mut RawArchive<C>) -> Result<Self, Error> {
        Ok(UnversionedHeaderFragment::from(archive.read_u16()?))
    }
}

impl From<u16> for UnversionedHeaderFragment {
    fn from(value: u16) -> Self {
        UnversionedHeaderFragment {
            skip_num: (value & Self::SKIP_NUM_MASK) as u8,
            has_zeros: (value & Self::HAS_ZEROS_MASK) != 0,
            is_last: (value & Self::IS_LAST_MASK) != 0,
            value_num: (value >> Self::VALUE_NUM_SHIFT) as u8,
        }
    }
}

/// Decoded unversioned header: the fragment list and the zero mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnversionedHeader {
    /// Fragments
    pub fragments: Vec<UnversionedHeaderFragment>,
    /// Zero mask, one bit per value of a `has_zeros` fragment
    pub zero_mask: BitVec<u8, Lsb0>,
    /// Number of meaningful bits in the zero mask
    pub zero_mask_bits: u16,
}

impl UnversionedHeader {
    fn load_zero_mask<C: Read + Seek>(
        archive: &mut RawArchive<C>,
        num_bits: u16,
    ) -> Result<BitVec<u8, Lsb0>, Error> {
        let num_bytes = if num_bits <= 8 {
            1
        } else if num_bits <= 16 {
            2
        } else {
            (num_bits as usize).div_ceil(32) * 4
        };

        let data = archive.read_bytes(num_bytes)?;
        Ok(BitVec::from_vec(data))
    }

    /// Read an `UnversionedHeader` from an archive.
    pub fn read<C: Read + Seek>(archive: &mut RawArchive<C>) -> Result<Self, Error> {
        let mut fragments = Vec::new();

        let mut zero_mask_bits = 0u16;

        loop {
            let fragment = UnversionedHeaderFragment::read(archive)?;

            if fragment.has_zeros {
                zero_mask_bits += fragment.value_num as u16;
            }

            let is_last = fragment.is_last;
            fragments.push(fragment);

            if is_last {
                break;
            }

            if fragments.len() > MAX_FRAGMENTS {
                return Err(Error::invalid_file(format!(
                    "Unversioned header has more than {MAX_FRAGMENTS} fragments, likely \
                     delta-serialized or corrupt data"
                )));
            }
        }

        let zero_mask = match zero_mask_bits > 0 {
            true => Self::load_zero_mask(archive, zero_mask_bits)?,
            false => BitVec::new(),
        };

        Ok(UnversionedHeader {
            fragments,
            zero_mask,
            zero_mask_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fragment_unpacking() {
        // skipNum=0, hasAnyZeroes=1, isLast=1, valueNum=1
        let fragment = UnversionedHeaderFragment::from(0x0181);
        assert_eq!(fragment.skip_num, 0);
        assert!(fragment.has_zeros);
        assert!(fragment.is_last);
        assert_eq!(fragment.value_num, 1);

        // skipNum=2, hasAnyZeroes=0, isLast=1, valueNum=1
        let fragment = UnversionedHeaderFragment::from(0x0102 | (1 << 9));
        assert_eq!(fragment.skip_num, 2);
        assert!(!fragment.has_zeros);
        assert!(fragment.is_last);
        assert_eq!(fragment.value_num, 1);
    }

    #[test]
    fn zero_mask_bit_count_matches_fragments() -> Result<(), Error> {
        // one fragment with zeros: 0x0181 little-endian, then a 1 byte mask
        let mut archive = RawArchive::new(Cursor::new(vec![0x81, 0x01, 0x01]))?;
        let header = UnversionedHeader::read(&mut archive)?;

        assert_eq!(header.fragments.len(), 1);
        assert_eq!(header.zero_mask_bits, 1);
        assert!(header.zero_mask[0]);
        assert_eq!(archive.position(), 3);
        Ok(())
    }

    #[test]
    fn runaway_header_is_fatal() -> Result<(), Error> {
        // endless non-last fragments
        let data = vec![0x00u8; 256];
        let mut archive = RawArchive::new(Cursor::new(data))?;
        assert!(UnversionedHeader::read(&mut archive).is_err());
        Ok(())
    }
}
