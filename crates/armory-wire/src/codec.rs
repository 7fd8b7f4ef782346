//! Primitive field encoding
//!
//! All integers are little-endian.
//! String: [LEN:2][UTF-8 bytes:LEN], LEN <= 256

use bytes::{Buf, BufMut};

use armory_core::{ArmoryError, ArmoryResult, Category};

/// Maximum string length in bytes
pub const MAX_STRING_LEN: usize = 256;

/// Write a length-prefixed string
pub fn put_string<B: BufMut>(buf: &mut B, s: &str) -> ArmoryResult<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(ArmoryError::Protocol(format!(
            "String too long: {} > {}",
            s.len(),
            MAX_STRING_LEN
        )));
    }
    buf.put_u16_le(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Read a length-prefixed string field
///
/// Only framing errors fail. A field that is over-long or not UTF-8 is
/// consumed and returned as `None` so the caller can drop just that field.
pub fn get_field<B: Buf>(buf: &mut B) -> ArmoryResult<Option<String>> {
    ensure(&*buf, 2)?;
    let len = buf.get_u16_le() as usize;
    ensure(&*buf, len)?;
    if len > MAX_STRING_LEN {
        buf.advance(len);
        return Ok(None);
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(String::from_utf8(bytes).ok())
}

/// Read a category byte
pub fn get_category<B: Buf>(buf: &mut B) -> ArmoryResult<Category> {
    ensure(&*buf, 1)?;
    let b = buf.get_u8();
    Category::from_byte(b).ok_or(ArmoryError::UnknownCategory(b))
}

/// Fail unless `len` more bytes are available
pub fn ensure<B: Buf>(buf: &B, len: usize) -> ArmoryResult<()> {
    if buf.remaining() < len {
        return Err(ArmoryError::BufferTooShort {
            expected: len,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

/// Encoded size of a string field
#[inline]
pub fn string_size(s: &str) -> usize {
    2 + s.len()
}
