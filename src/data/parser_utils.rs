//! Shared winnow-based parsing utilities used by the container, model, and texture parsers.

use winnow::Parser;
use winnow::binary::Endianness;
use winnow::error::ContextError;

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

/// A fixed-width integer field readable from a byte buffer.
pub trait Field: Sized + Copy {
    const SIZE: usize;

    fn parse(input: &mut &[u8], endian: Endianness) -> WResult<Self>;
}

impl Field for u32 {
    const SIZE: usize = 4;

    fn parse(input: &mut &[u8], endian: Endianness) -> WResult<Self> {
        winnow::binary::u32(endian).parse_next(input)
    }
}

impl Field for i32 {
    const SIZE: usize = 4;

    fn parse(input: &mut &[u8], endian: Endianness) -> WResult<Self> {
        winnow::binary::i32(endian).parse_next(input)
    }
}

impl Field for u16 {
    const SIZE: usize = 2;

    fn parse(input: &mut &[u8], endian: Endianness) -> WResult<Self> {
        winnow::binary::u16(endian).parse_next(input)
    }
}

impl Field for i16 {
    const SIZE: usize = 2;

    fn parse(input: &mut &[u8], endian: Endianness) -> WResult<Self> {
        winnow::binary::i16(endian).parse_next(input)
    }
}

/// Parse `N` consecutive big-endian i32 words.
pub fn be_words<const N: usize>(input: &mut &[u8]) -> WResult<[i32; N]> {
    let mut words = [0i32; N];
    for word in &mut words {
        *word = winnow::binary::be_i32.parse_next(input)?;
    }
    Ok(words)
}

/// Read a null-terminated string from `file_data` starting at `offset`.
///
/// Returns `None` if `offset` is past the end of the buffer or the bytes are not UTF-8.
pub fn read_null_terminated_string(file_data: &[u8], offset: usize) -> Option<&str> {
    let remaining = file_data.get(offset..)?;
    let end = remaining
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(remaining.len());
    std::str::from_utf8(&remaining[..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_terminated_string_stops_at_nul() {
        let data = b"skip\0rock_01\0tail";
        assert_eq!(read_null_terminated_string(data, 5), Some("rock_01"));
        assert_eq!(read_null_terminated_string(data, 13), Some("tail"));
        assert_eq!(read_null_terminated_string(data, 64), None);
    }

    #[test]
    fn be_words_reads_in_order() {
        let bytes = [0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFE];
        let input = &mut &bytes[..];
        assert_eq!(be_words::<2>(input).unwrap(), [1, -2]);
        assert!(input.is_empty());
    }
}
