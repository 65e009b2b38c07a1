//! Binary archive reader

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{ReadBytesExt, LE};
use uview_helpers::{Guid, UnrealReadExt};

use crate::error::Error;
use crate::types::{FMappedName, SerializedNameHeader};

/// A bounds-aware little-endian reader over any seekable byte source.
///
/// Every read is fallible; short input surfaces as an error, never a panic
/// or a partial result.
pub struct RawArchive<C: Read + Seek> {
    cursor: C,
    length: u64,
}

impl<C: Read + Seek> RawArchive<C> {
    /// Create a new `RawArchive`, measuring the source length.
    pub fn new(mut cursor: C) -> Result<Self, Error> {
        let length = cursor.seek(SeekFrom::End(0))?;
        cursor.seek(SeekFrom::Start(0))?;

        Ok(RawArchive { cursor, length })
    }

    /// Current position
    pub fn position(&mut self) -> u64 {
        self.cursor.stream_position().unwrap_or_default()
    }

    /// Total length of the source
    pub fn data_length(&self) -> u64 {
        self.length
    }

    /// Seek to an absolute position
    pub fn set_position(&mut self, position: u64) -> Result<(), Error> {
        self.cursor.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Skip `count` bytes
    pub fn skip(&mut self, count: i64) -> Result<(), Error> {
        self.cursor.seek(SeekFrom::Current(count))?;
        Ok(())
    }

    /// Read a `u8`
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.cursor.read_u8()?)
    }

    /// Read an `i8`
    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.cursor.read_i8()?)
    }

    /// Read a little-endian `u16`
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(self.cursor.read_u16::<LE>()?)
    }

    /// Read a little-endian `i16`
    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(self.cursor.read_i16::<LE>()?)
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(self.cursor.read_u32::<LE>()?)
    }

    /// Read a little-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(self.cursor.read_i32::<LE>()?)
    }

    /// Read a little-endian `u64`
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(self.cursor.read_u64::<LE>()?)
    }

    /// Read a little-endian `i64`
    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(self.cursor.read_i64::<LE>()?)
    }

    /// Read a little-endian `f32`
    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(self.cursor.read_f32::<LE>()?)
    }

    /// Read a little-endian `f64`
    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(self.cursor.read_f64::<LE>()?)
    }

    /// Read a `bool` stored as one byte
    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.cursor.read_bool()?)
    }

    /// Read a 16 byte guid
    pub fn read_guid(&mut self) -> Result<Guid, Error> {
        Ok(self.cursor.read_guid()?)
    }

    /// Read exactly `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; count];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read an FString
    pub fn read_fstring(&mut self) -> Result<Option<String>, Error> {
        Ok(self.cursor.read_fstring()?)
    }

    /// Read a string of a known length without a terminator
    pub fn read_fstring_len_noterm(&mut self, len: i32) -> Result<Option<String>, Error> {
        Ok(self.cursor.read_fstring_len_noterm(len)?)
    }

    /// Read a [`SerializedNameHeader`]
    pub fn read_name_header(&mut self) -> Result<SerializedNameHeader, Error> {
        SerializedNameHeader::read(&mut self.cursor)
    }

    /// Read an [`FMappedName`]
    pub fn read_mapped_name(&mut self) -> Result<FMappedName, Error> {
        FMappedName::read(&mut self.cursor)
    }

    /// Read an array with the length read from this archive as an `i32`
    pub fn read_array<T>(
        &mut self,
        getter: impl Fn(&mut Self) -> Result<T, Error>,
    ) -> Result<Vec<T>, Error> {
        let length = self.read_i32()?;
        self.read_array_with_length(length, getter)
    }

    /// Read an array with the specified length
    pub fn read_array_with_length<T>(
        &mut self,
        length: i32,
        getter: impl Fn(&mut Self) -> Result<T, Error>,
    ) -> Result<Vec<T>, Error> {
        let mut array = Vec::with_capacity(length.max(0) as usize);
        for _ in 0..length {
            array.push(getter(self)?);
        }
        Ok(array)
    }
}

impl<C: Read + Seek> Read for RawArchive<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl<C: Read + Seek> Seek for RawArchive<C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn primitive_reads_are_little_endian() -> Result<(), Error> {
        let mut archive = RawArchive::new(Cursor::new(vec![
            0x2A, 0x00, 0x00, 0x00, 0x01, 0xFF,
        ]))?;

        assert_eq!(archive.data_length(), 6);
        assert_eq!(archive.read_i32()?, 42);
        assert_eq!(archive.read_bool()?, true);
        assert_eq!(archive.read_i8()?, -1);
        assert_eq!(archive.position(), 6);

        Ok(())
    }

    #[test]
    fn short_input_is_an_error() -> Result<(), Error> {
        let mut archive = RawArchive::new(Cursor::new(vec![0x01, 0x02]))?;
        assert!(archive.read_u32().is_err());
        Ok(())
    }
}
