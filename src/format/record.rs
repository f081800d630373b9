use serde::Deserialize;

use crate::format::hex::hex_field;
use crate::format::{LoadError, ADDR_SIZE, BYTE_SIZE, HEADER_RECORD_SIZE, MODIFICATION_HALF_BYTES};

const TEXT_BYTES_AT: usize = 1 + ADDR_SIZE + BYTE_SIZE;
const MODIFICATION_LENGTH_AT: usize = 1 + ADDR_SIZE;

/// Per-kind token widths. A token must be strictly shorter than its limit,
/// the limit counting the terminator of the fixed-size record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordLimits {
    pub text_record_size: usize,
    pub modification_record_size: usize,
    pub end_record_size: usize,
}

impl Default for RecordLimits {
    fn default() -> Self {
        Self {
            text_record_size: 70,
            modification_record_size: 10,
            end_record_size: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub name: String,
    pub start_address: u32,
    pub program_size: u32,
}

impl HeaderRecord {
    /// Checks length, tag and printability of a header line without
    /// decoding its fields.
    ///
    /// # Errors
    /// Returns `LoadError::MalformedRecord` when the line is not a header.
    pub fn check_shape(line: &str) -> Result<(), LoadError> {
        if line.len() + 1 != HEADER_RECORD_SIZE {
            return Err(LoadError::malformed(format!(
                "header record must be {} characters, got {}",
                HEADER_RECORD_SIZE - 1,
                line.len()
            )));
        }
        if !line.starts_with('H') {
            return Err(LoadError::malformed("header record must start with 'H'"));
        }
        if !line.bytes().all(|c| c.is_ascii_graphic() || c == b' ') {
            return Err(LoadError::malformed("header record contains unprintable characters"));
        }
        Ok(())
    }

    /// # Errors
    /// Returns `MalformedRecord` for a bad line shape and `AddressDecode`
    /// when the start address or program size is not hex.
    pub fn parse(line: &str) -> Result<Self, LoadError> {
        Self::check_shape(line)?;
        let bytes = line.as_bytes();
        let start_address = hex_field(bytes, 1 + ADDR_SIZE, ADDR_SIZE, "start address")?;
        let program_size = hex_field(bytes, 1 + 2 * ADDR_SIZE, ADDR_SIZE, "program size")?;
        Ok(Self {
            name: line[1..=ADDR_SIZE].to_string(),
            start_address,
            program_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub start_offset: u32,
    pub bytes: Vec<u8>,
}

impl TextRecord {
    /// # Errors
    /// Returns `MalformedRecord` when the token is too long or carries more
    /// byte pairs than declared, and `AddressDecode` for any bad hex field
    /// including missing byte pairs.
    pub fn parse(token: &str, limits: &RecordLimits) -> Result<Self, LoadError> {
        check_width(token, limits.text_record_size, "text")?;
        check_tag(token, b'T', "text")?;
        let raw = token.as_bytes();
        let start_offset = hex_field(raw, 1, ADDR_SIZE, "text start offset")?;
        let count = hex_field(raw, 1 + ADDR_SIZE, BYTE_SIZE, "text byte count")? as usize;
        let bytes = (0..count)
            .map(|i| {
                hex_field(raw, TEXT_BYTES_AT + i * BYTE_SIZE, BYTE_SIZE, "text byte")
                    .map(|b| b as u8)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let used = TEXT_BYTES_AT + count * BYTE_SIZE;
        if raw.len() > used {
            return Err(LoadError::malformed(format!(
                "text record declares {count} bytes but carries {} extra characters",
                raw.len() - used
            )));
        }
        Ok(Self {
            start_offset,
            bytes,
        })
    }
}

/// Patches the 20-bit address field of a three-byte word at `start_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationRecord {
    pub start_offset: u32,
}

impl ModificationRecord {
    /// Accepts `M` + offset, optionally followed by the length field, which
    /// must name the five half-bytes of the address field.
    ///
    /// # Errors
    /// Returns `MalformedRecord` for a bad width, tag or length field and
    /// `AddressDecode` for a bad offset.
    pub fn parse(token: &str, limits: &RecordLimits) -> Result<Self, LoadError> {
        check_width(token, limits.modification_record_size, "modification")?;
        check_tag(token, b'M', "modification")?;
        let raw = token.as_bytes();
        let start_offset = hex_field(raw, 1, ADDR_SIZE, "modification start offset")?;
        if raw.len() > MODIFICATION_LENGTH_AT {
            let length = hex_field(raw, MODIFICATION_LENGTH_AT, BYTE_SIZE, "modification length")?;
            if length != MODIFICATION_HALF_BYTES {
                return Err(LoadError::malformed(format!(
                    "unsupported modification length {length:02X}, only {MODIFICATION_HALF_BYTES:02X} half-bytes are supported"
                )));
            }
            if raw.len() > MODIFICATION_LENGTH_AT + BYTE_SIZE {
                return Err(LoadError::malformed("trailing characters after modification length"));
            }
        }
        Ok(Self { start_offset })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRecord {
    pub transfer_address: Option<u32>,
}

impl EndRecord {
    /// # Errors
    /// Returns `MalformedRecord` for a bad width or tag and `AddressDecode`
    /// for a bad transfer address.
    pub fn parse(token: &str, limits: &RecordLimits) -> Result<Self, LoadError> {
        check_width(token, limits.end_record_size, "end")?;
        check_tag(token, b'E', "end")?;
        let raw = token.as_bytes();
        if raw.len() == 1 {
            return Ok(Self {
                transfer_address: None,
            });
        }
        let transfer_address = hex_field(raw, 1, ADDR_SIZE, "transfer address")?;
        if raw.len() > 1 + ADDR_SIZE {
            return Err(LoadError::malformed("trailing characters after transfer address"));
        }
        Ok(Self {
            transfer_address: Some(transfer_address),
        })
    }

    #[must_use]
    pub fn transfer_or(&self, start_address: u32) -> u32 {
        self.transfer_address.unwrap_or(start_address)
    }
}

pub(crate) fn check_width(token: &str, limit: usize, kind: &str) -> Result<(), LoadError> {
    if token.len() >= limit {
        return Err(LoadError::malformed(format!(
            "{kind} record is {} characters, limit is {}",
            token.len(),
            limit - 1
        )));
    }
    Ok(())
}

fn check_tag(token: &str, tag: u8, kind: &str) -> Result<(), LoadError> {
    if token.as_bytes().first() != Some(&tag) {
        return Err(LoadError::malformed(format!(
            "{kind} record must start with '{}'",
            char::from(tag)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EndRecord, HeaderRecord, ModificationRecord, RecordLimits, TextRecord};
    use crate::format::LoadError;

    #[test]
    fn parses_header_fields() {
        let header = HeaderRecord::parse("HABCDEF001000000010").expect("header");
        assert_eq!(header.name, "ABCDEF");
        assert_eq!(header.start_address, 0x1000);
        assert_eq!(header.program_size, 0x10);
    }

    #[test]
    fn rejects_header_of_wrong_length_or_tag() {
        for line in ["HABCDEF00100000001", "HABCDEF0010000000100", "", "XABCDEF001000000010"] {
            let err = HeaderRecord::parse(line).expect_err("must fail");
            assert!(matches!(err, LoadError::MalformedRecord(_)), "{line:?}");
        }
    }

    #[test]
    fn header_with_bad_hex_is_address_error() {
        let err = HeaderRecord::parse("HABCDEF0010G0000010").expect_err("must fail");
        assert!(matches!(err, LoadError::AddressDecode { field: "start address", .. }));
        let err = HeaderRecord::parse("HABCDEF00100000001 ").expect_err("must fail");
        assert!(matches!(err, LoadError::AddressDecode { field: "program size", .. }));
    }

    #[test]
    fn parses_text_record() {
        let text = TextRecord::parse("T00100003AABBCC", &RecordLimits::default()).expect("text");
        assert_eq!(text.start_offset, 0x1000);
        assert_eq!(text.bytes, vec![0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn text_record_with_too_few_bytes_is_address_error() {
        let err = TextRecord::parse("T0010000AABCDEF01234567", &RecordLimits::default())
            .expect_err("must fail");
        assert!(matches!(err, LoadError::AddressDecode { field: "text byte", .. }));
    }

    #[test]
    fn text_record_with_extra_bytes_is_malformed() {
        let err = TextRecord::parse("T00100001AABB", &RecordLimits::default()).expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }

    #[test]
    fn text_record_at_width_limit_is_malformed() {
        let token = format!("T0000001E{}", "00".repeat(30));
        assert_eq!(token.len(), 69);
        TextRecord::parse(&token, &RecordLimits::default()).expect("69 characters fit");
        let token = format!("{token}0");
        let err = TextRecord::parse(&token, &RecordLimits::default()).expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }

    #[test]
    fn parses_modification_with_and_without_length() {
        let limits = RecordLimits::default();
        let plain = ModificationRecord::parse("M000007", &limits).expect("plain");
        let sized = ModificationRecord::parse("M00000705", &limits).expect("sized");
        assert_eq!(plain, sized);
        assert_eq!(plain.start_offset, 7);
    }

    #[test]
    fn rejects_unsupported_modification_length() {
        let err = ModificationRecord::parse("M00000706", &RecordLimits::default())
            .expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }

    #[test]
    fn end_record_transfer_address_is_optional() {
        let limits = RecordLimits::default();
        let bare = EndRecord::parse("E", &limits).expect("bare");
        assert_eq!(bare.transfer_or(0x1000), 0x1000);
        let full = EndRecord::parse("E001003", &limits).expect("full");
        assert_eq!(full.transfer_or(0x1000), 0x1003);
    }

    #[test]
    fn end_record_with_short_or_bad_address_fails() {
        let limits = RecordLimits::default();
        let err = EndRecord::parse("E1003", &limits).expect_err("must fail");
        assert!(err.is_address_error());
        let err = EndRecord::parse("E0010030", &limits).expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
        let err = EndRecord::parse("X001003", &limits).expect_err("must fail");
        assert!(matches!(err, LoadError::MalformedRecord(_)));
    }
}
