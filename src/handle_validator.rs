//! Handle syntax validation.
//!
//! Handles are short, globally unique, human-readable names:
//! - Length: 3-20 characters
//! - Charset: `A-Z`, `a-z`, `0-9`, `_`, `-`
//! - Case-sensitive, no folding: `alice` and `ALICE` are distinct
//!
//! Length and charset are independent checks so that a caller (or a test)
//! can tell exactly which rule a candidate handle breaks. Availability is
//! the third, index-dependent check and lives on the store.

/// Minimum handle length in characters.
pub const MIN_HANDLE_LENGTH: usize = 3;

/// Maximum handle length in characters.
pub const MAX_HANDLE_LENGTH: usize = 20;

/// Check that a handle's character count is within [3, 20].
pub fn is_valid_length(handle: &str) -> bool {
    let len = handle.chars().count();
    (MIN_HANDLE_LENGTH..=MAX_HANDLE_LENGTH).contains(&len)
}

/// Check that every character of a handle is in the allowed charset.
///
/// An empty handle passes this check; it fails the length check instead.
pub fn is_valid_charset(handle: &str) -> bool {
    handle.chars().all(is_handle_char)
}

/// Check both syntax rules at once.
pub fn is_valid_syntax(handle: &str) -> bool {
    is_valid_length(handle) && is_valid_charset(handle)
}

/// Check if a character is allowed in a handle.
#[inline]
fn is_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
