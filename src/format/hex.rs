use crate::format::LoadError;

/// Decodes a run of hex digits as an unsigned integer.
///
/// Returns `None` when the run is empty, longer than a `u32` can hold, or
/// contains anything outside `[0-9A-Fa-f]`. Signs, prefixes and whitespace
/// are all rejected.
#[must_use]
pub fn decode_hex(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    digits.iter().try_fold(0u32, |acc, &c| {
        let nibble = char::from(c).to_digit(16)?;
        Some((acc << 4) | nibble)
    })
}

/// Decodes the fixed-width field `token[at..at + width]`.
///
/// A token that ends inside the field fails the same way as a bad digit.
///
/// # Errors
/// Returns `LoadError::AddressDecode` naming `field` when the field is
/// incomplete or not pure hex.
pub fn hex_field(
    token: &[u8],
    at: usize,
    width: usize,
    field: &'static str,
) -> Result<u32, LoadError> {
    let end = at.saturating_add(width);
    token
        .get(at..end)
        .and_then(decode_hex)
        .ok_or_else(|| LoadError::AddressDecode {
            field,
            text: String::from_utf8_lossy(token.get(at..).unwrap_or_default())
                .chars()
                .take(width)
                .collect(),
        })
}
