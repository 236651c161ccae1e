//! The MTAG format descriptor language: a closed alphabet of single-byte
//! tags describing how a buffer's sub-header and payload are packed.
//!
//! Tag semantics are taken verbatim from the source format, including the
//! uppercase/lowercase signedness inversion between wire type and decoded
//! storage type (`B` is `uint8` on the wire but decodes to `int8`, `b` is
//! `int8` on the wire but decodes to `uint8`, and so on). This is
//! preserved exactly as specified; see the note on `Tag::B` below.

use std::fmt;

/// One tag from the format alphabet, after resolving the `I`/`L` and
/// `i`/`l` aliases to a single wire representation each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `B` — `uint8` on the wire, decoded as `int8`.
    B,
    /// `b` — `int8` on the wire, decoded as `uint8`.
    LowerB,
    /// `H` — `uint16` on the wire, decoded as `int16`.
    H,
    /// `h` — `int16` on the wire, decoded as `uint16`.
    LowerH,
    /// `U` — `uint24` on the wire, decoded as `int32`.
    U,
    /// `u` — `int24` on the wire, decoded as `uint32`.
    LowerU,
    /// `I` or `L` — `uint32` on the wire, decoded as `int32`.
    I,
    /// `i` or `l` — `int32` on the wire, decoded as `uint32`.
    LowerI,
    /// `f` — `float32`.
    F,
    /// `X` or `x` — zero-filled padding; consumed but emits no element.
    Pad,
    /// `T` — `uint32` microsecond timestamp, decoded as a monotonic `uint64`.
    T,
}

/// Decoded storage class for a tag, per the format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Ignored,
    Time,
}

/// Format-string level errors, resolved to the caller's choice of
/// `MtagError` variant — different callers have different device-name
/// context available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    UnknownTag(char),
    MultipleTime,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnknownTag(c) => write!(f, "unknown format tag '{c}'"),
            FormatError::MultipleTime => write!(f, "format string contains more than one 'T' tag"),
        }
    }
}

fn parse_tag(c: char) -> Result<Tag, FormatError> {
    match c {
        'B' => Ok(Tag::B),
        'b' => Ok(Tag::LowerB),
        'H' => Ok(Tag::H),
        'h' => Ok(Tag::LowerH),
        'U' => Ok(Tag::U),
        'u' => Ok(Tag::LowerU),
        'I' | 'L' => Ok(Tag::I),
        'i' | 'l' => Ok(Tag::LowerI),
        'f' => Ok(Tag::F),
        'X' | 'x' => Ok(Tag::Pad),
        'T' => Ok(Tag::T),
        other => Err(FormatError::UnknownTag(other)),
    }
}

/// Size in bytes of one tag's on-wire representation.
pub fn tag_size(tag: Tag) -> u32 {
    match tag {
        Tag::B | Tag::LowerB | Tag::Pad => 1,
        Tag::H | Tag::LowerH => 2,
        Tag::U | Tag::LowerU => 3,
        Tag::I | Tag::LowerI | Tag::F | Tag::T => 4,
    }
}

/// Decoded storage class for a tag.
pub fn decoded_type(tag: Tag) -> ElementType {
    match tag {
        Tag::B => ElementType::Int8,
        Tag::LowerB => ElementType::UInt8,
        Tag::H => ElementType::Int16,
        Tag::LowerH => ElementType::UInt16,
        Tag::U => ElementType::Int32,
        Tag::LowerU => ElementType::UInt32,
        Tag::I => ElementType::Int32,
        Tag::LowerI => ElementType::UInt32,
        Tag::F => ElementType::Float32,
        Tag::Pad => ElementType::Ignored,
        Tag::T => ElementType::Time,
    }
}

/// Parse every character of `fmt` into a `Tag`, left to right.
pub fn parse_format(fmt: &str) -> Result<Vec<Tag>, FormatError> {
    fmt.chars().map(parse_tag).collect()
}

/// Sum of per-tag sizes.
pub fn packet_size(fmt: &str) -> Result<u32, FormatError> {
    Ok(parse_format(fmt)?.into_iter().map(tag_size).sum())
}

/// `(data_channels, time_channels)`: `(len(fmt), 0)` normally, or
/// `(len(fmt)-1, 1)` when a single `T` tag is present. More than one `T`
/// is an error.
pub fn channel_count(fmt: &str) -> Result<(usize, usize), FormatError> {
    let tags = parse_format(fmt)?;
    let time_channels = tags.iter().filter(|t| **t == Tag::T).count();
    if time_channels > 1 {
        return Err(FormatError::MultipleTime);
    }
    Ok((tags.len() - time_channels, time_channels))
}

/// Decoded storage class per tag, in format-string order.
pub fn decoded_element_types(fmt: &str) -> Result<Vec<ElementType>, FormatError> {
    Ok(parse_format(fmt)?.into_iter().map(decoded_type).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_size_sums_tag_sizes() {
        assert_eq!(packet_size("BTx").unwrap(), 1 + 4 + 1);
        assert_eq!(packet_size("HB").unwrap(), 2 + 1);
    }

    #[test]
    fn packet_size_rejects_unknown_tag() {
        assert_eq!(packet_size("BQ").unwrap_err(), FormatError::UnknownTag('Q'));
    }

    #[test]
    fn channel_count_splits_off_time() {
        assert_eq!(channel_count("BTx").unwrap(), (2, 1));
        assert_eq!(channel_count("HB").unwrap(), (2, 0));
    }

    #[test]
    fn channel_count_rejects_multiple_time() {
        assert_eq!(channel_count("TT").unwrap_err(), FormatError::MultipleTime);
    }

    #[test]
    fn il_and_lowercase_il_are_aliases() {
        assert_eq!(
            decoded_element_types("IL").unwrap(),
            vec![ElementType::Int32; 2]
        );
        assert_eq!(
            decoded_element_types("il").unwrap(),
            vec![ElementType::UInt32; 2]
        );
    }

    #[test]
    fn inversion_is_preserved_verbatim() {
        // B is uint8 on the wire but decodes to int8; b is the reverse.
        assert_eq!(decoded_type(Tag::B), ElementType::Int8);
        assert_eq!(decoded_type(Tag::LowerB), ElementType::UInt8);
    }
}
