//! FText deserialization across its history types

use std::io::{Read, Seek};

use crate::archive::RawArchive;
use crate::error::Error;

/// Bound on text format argument counts
const MAX_FORMAT_ARGUMENTS: i32 = 10_000;

/// Decoded FText value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextValue {
    /// Text flags word
    pub flags: u32,
    /// History type byte as serialized
    pub history_type: i8,
    /// Localization namespace, for `Base`
    pub namespace: Option<String>,
    /// Localization key, for `Base` and `StringTableEntry`
    pub key: Option<String>,
    /// Source or culture-invariant string, when the history carries one
    pub source: Option<String>,
    /// String table id, for `StringTableEntry`
    pub table_id: Option<String>,
}

impl TextValue {
    /// The most displayable string this text carries.
    pub fn display(&self) -> Option<&str> {
        self.source.as_deref().or(self.key.as_deref())
    }
}

/// Read an FText value. Histories that only format other texts are parsed
/// to advance the cursor, keeping their base text.
///
/// Returns `Ok(None)` for history types this reader does not understand;
/// the caller emits the diagnostic.
pub fn read_text<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    name_table: &[String],
) -> Result<Option<TextValue>, Error> {
    let flags = archive.read_u32()?;
    let history_type = archive.read_i8()?;

    let mut text = TextValue {
        flags,
        history_type,
        ..Default::default()
    };

    match history_type {
        // no history; optionally a culture invariant string
        -1 => {
            let has_culture_invariant = archive.read_i32()? != 0;
            if has_culture_invariant {
                text.source = archive.read_fstring()?;
            }
        }
        // base: namespace, key, source
        0 => {
            text.namespace = archive.read_fstring()?;
            text.key = archive.read_fstring()?;
            text.source = archive.read_fstring()?;
        }
        // named format, ordered format, argument format
        1..=3 => {
            let base = read_text(archive, name_table)?;
            let argument_count = archive.read_i32()?;
            if !(0..=MAX_FORMAT_ARGUMENTS).contains(&argument_count) {
                return Err(Error::invalid_file(format!(
                    "Implausible text format argument count {argument_count}"
                )));
            }

            for _ in 0..argument_count {
                // named and argument forms prefix each argument with a name
                if history_type == 1 || history_type == 3 {
                    let _argument_name = archive.read_fstring()?;
                }
                skip_format_argument_value(archive, name_table)?;
            }

            if let Some(base) = base {
                text.source = base.source;
                text.namespace = base.namespace;
                text.key = base.key;
            }
        }
        // as number, as percent, as currency
        4..=6 => {
            if history_type == 6 {
                let _currency_code = archive.read_fstring()?;
            }
            skip_format_argument_value(archive, name_table)?;
            skip_number_format_options(archive)?;
            let _target_culture = archive.read_fstring()?;
        }
        // as date, as time
        7 | 8 => {
            // source date time and date style
            archive.skip(8 + 1)?;
            let _time_zone = archive.read_fstring()?;
            let _target_culture = archive.read_fstring()?;
        }
        // as date time
        9 => {
            // source date time, date style, time style
            archive.skip(8 + 1 + 1)?;
            let _time_zone = archive.read_fstring()?;
            let _target_culture = archive.read_fstring()?;
        }
        // transform
        10 => {
            let base = read_text(archive, name_table)?;
            let _transform_type = archive.read_u8()?;
            if let Some(base) = base {
                text.source = base.source;
            }
        }
        // string table entry
        11 => {
            let table_index = archive.read_i32()?;
            let table_number = archive.read_i32()?;
            text.table_id = name_table.get(table_index as usize).map(|name| {
                match table_number {
                    0 => name.clone(),
                    number => format!("{}_{}", name, number - 1),
                }
            });
            text.key = archive.read_fstring()?;
        }
        // text generator
        12 => {
            archive.skip(8)?;
        }
        _ => return Ok(None),
    }

    Ok(Some(text))
}

/// Format argument value: a type byte then the typed payload.
fn skip_format_argument_value<C: Read + Seek>(
    archive: &mut RawArchive<C>,
    name_table: &[String],
) -> Result<(), Error> {
    let argument_type = archive.read_i8()?;
    match argument_type {
        // int, uint
        0 | 1 => archive.skip(8)?,
        // float
        2 => archive.skip(4)?,
        // double
        3 => archive.skip(8)?,
        // text
        4 => {
            read_text(archive, name_table)?;
        }
        // gender
        5 => archive.skip(4)?,
        other => {
            return Err(Error::invalid_file(format!(
                "Unknown text format argument type {other}"
            )))
        }
    }
    Ok(())
}

/// Optional number formatting options block.
fn skip_number_format_options<C: Read + Seek>(archive: &mut RawArchive<C>) -> Result<(), Error> {
    let has_options = archive.read_u8()? != 0;
    if has_options {
        archive.skip(1 + 1 + 16)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fstring(value: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(value.len() as i32 + 1).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
        out.push(0);
        out
    }

    #[test]
    fn base_history() -> Result<(), Error> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(0); // base
        data.extend_from_slice(&fstring("NS"));
        data.extend_from_slice(&fstring("Key"));
        data.extend_from_slice(&fstring("Hello"));

        let mut archive = RawArchive::new(Cursor::new(data))?;
        let text = read_text(&mut archive, &[])?.unwrap();

        assert_eq!(text.namespace.as_deref(), Some("NS"));
        assert_eq!(text.key.as_deref(), Some("Key"));
        assert_eq!(text.display(), Some("Hello"));
        Ok(())
    }

    #[test]
    fn culture_invariant() -> Result<(), Error> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(-1i8).to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&fstring("Raw"));

        let mut archive = RawArchive::new(Cursor::new(data))?;
        let text = read_text(&mut archive, &[])?.unwrap();
        assert_eq!(text.display(), Some("Raw"));
        Ok(())
    }

    #[test]
    fn unsupported_history_returns_none() -> Result<(), Error> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(100);

        let mut archive = RawArchive::new(Cursor::new(data))?;
        assert!(read_text(&mut archive, &[])?.is_none());
        Ok(())
    }

    #[test]
    fn string_table_entry() -> Result<(), Error> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(11);
        data.extend_from_slice(&0i32.to_le_bytes()); // table name index
        data.extend_from_slice(&0i32.to_le_bytes()); // number
        data.extend_from_slice(&fstring("Row"));

        let mut archive = RawArchive::new(Cursor::new(data))?;
        let text = read_text(&mut archive, &["/Game/Tables/UI".to_string()])?.unwrap();
        assert_eq!(text.table_id.as_deref(), Some("/Game/Tables/UI"));
        assert_eq!(text.key.as_deref(), Some("Row"));
        Ok(())
    }
}
