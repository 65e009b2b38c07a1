use std::io::Cursor;

use uview_helpers::error::FStringError;
use uview_helpers::UnrealReadExt;

#[test]
fn test_read_fstring() -> Result<(), FStringError> {
    // ASCII
    let mut cursor = Cursor::new(vec![5u8, 0u8, 0u8, 0u8, b't', b'e', b's', b't', 0u8]);
    let maybe_string = cursor.read_fstring()?;
    assert_eq!(maybe_string, Some("test".to_string()));

    // Non-ASCII
    let mut cursor = Cursor::new(vec![0xfeu8, 0xffu8, 0xffu8, 0xffu8, 0xa7u8, 0u8, 0u8, 0u8]);
    let maybe_string = cursor.read_fstring()?;
    assert_eq!(maybe_string, Some("\u{A7}".to_string()));

    // Null
    let mut cursor = Cursor::new(vec![0u8; 4]);
    let maybe_string = cursor.read_fstring()?;
    assert_eq!(maybe_string, None);

    // Missing null terminator
    let mut cursor = Cursor::new(vec![1u8, 0u8, 0u8, 0u8, b't']);
    let err = cursor.read_fstring().expect_err("Expected err");
    assert!(matches!(err, FStringError::InvalidStringTerminator(116, 5)));

    // Implausible length
    let mut cursor = Cursor::new(vec![0xffu8, 0xffu8, 0xffu8, 0x7fu8]);
    let err = cursor.read_fstring().expect_err("Expected err");
    assert!(matches!(err, FStringError::InvalidStringSize(_, _)));

    Ok(())
}

#[test]
fn test_read_fstring_len_noterm() -> Result<(), FStringError> {
    let mut cursor = Cursor::new(vec![b'a', b'b', b'c']);
    assert_eq!(
        cursor.read_fstring_len_noterm(3)?,
        Some("abc".to_string())
    );

    let mut cursor = Cursor::new(vec![0xa7u8, 0u8]);
    assert_eq!(
        cursor.read_fstring_len_noterm(-1)?,
        Some("\u{A7}".to_string())
    );

    let mut cursor = Cursor::new(Vec::new());
    assert_eq!(cursor.read_fstring_len_noterm(0)?, None);

    Ok(())
}
