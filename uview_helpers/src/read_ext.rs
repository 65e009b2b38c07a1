//! Extension for anything that implements Read to more easily read Unreal data formats.

use std::io::{Read, Seek};
use std::mem::size_of;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::FStringError;
use crate::guid::Guid;

/// Extension for anything that implements Read to more easily read Unreal data formats.
pub trait UnrealReadExt {
    /// Read string of format \<length i32\>\<string\>\<null\>
    fn read_fstring(&mut self) -> Result<Option<String>, FStringError>;
    /// Read a string of the given length without a null terminator.
    ///
    /// A negative length marks a UTF-16 string of `-len` code units.
    fn read_fstring_len_noterm(&mut self, len: i32) -> Result<Option<String>, FStringError>;
    /// Read u8 as bool
    fn read_bool(&mut self) -> Result<bool, std::io::Error>;
    /// Read a 16 byte guid
    fn read_guid(&mut self) -> Result<Guid, std::io::Error>;
}

impl<R: Read + Seek> UnrealReadExt for R {
    fn read_fstring(&mut self) -> Result<Option<String>, FStringError> {
        let len = self.read_i32::<LittleEndian>()?;
        if len == i32::MIN || !(-131072..=131072).contains(&len) {
            return Err(FStringError::InvalidStringSize(len, self.stream_position()?));
        }

        if len == 0 {
            return Ok(None);
        }

        if len < 0 {
            let num_bytes = (-len) as usize * size_of::<u16>() - 2;
            let mut buf = vec![0u8; num_bytes];
            self.read_exact(&mut buf)?;

            let terminator = self.read_u16::<LittleEndian>()?;
            if terminator != 0 {
                return Err(FStringError::InvalidStringTerminator(
                    terminator,
                    self.stream_position()?,
                ));
            }

            let code_units = buf
                .chunks(2)
                .map(|e| u16::from_le_bytes([e[0], e[1]]))
                .collect::<Vec<_>>();
            Ok(Some(String::from_utf16(&code_units)?))
        } else {
            let mut buf = vec![0u8; len as usize - 1];
            self.read_exact(&mut buf)?;

            let terminator = self.read_u8()?;
            if terminator != 0 {
                return Err(FStringError::InvalidStringTerminator(
                    terminator as u16,
                    self.stream_position()?,
                ));
            }

            Ok(Some(String::from_utf8(buf)?))
        }
    }

    fn read_fstring_len_noterm(&mut self, len: i32) -> Result<Option<String>, FStringError> {
        if len == 0 {
            return Ok(None);
        }

        if len < 0 {
            let num_bytes = (-len) as usize * size_of::<u16>();
            let mut buf = vec![0u8; num_bytes];
            self.read_exact(&mut buf)?;

            let code_units = buf
                .chunks(2)
                .map(|e| u16::from_le_bytes([e[0], e[1]]))
                .collect::<Vec<_>>();
            Ok(Some(String::from_utf16(&code_units)?))
        } else {
            let mut buf = vec![0u8; len as usize];
            self.read_exact(&mut buf)?;
            Ok(Some(String::from_utf8(buf)?))
        }
    }

    fn read_bool(&mut self) -> Result<bool, std::io::Error> {
        let res = self.read_u8()?;
        Ok(res > 0)
    }

    fn read_guid(&mut self) -> Result<Guid, std::io::Error> {
        let mut buf = [0u8; 16];
        self.read_exact(&mut buf)?;
        Ok(Guid::new(buf))
    }
}
