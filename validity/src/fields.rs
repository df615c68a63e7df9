//! Optional free-text fields.
//!
//! Records arrive with blanks and the literal `N/A` standing in for "no value".
//! Both collapse to `None` here, once, so nothing downstream has to re-check.

use serde::{Deserialize, Deserializer};

/// Sentinel the front office types for "not applicable".
pub const NOT_APPLICABLE: &str = "N/A";

/// Whether a raw field carries a real value.
pub fn has_value(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(NOT_APPLICABLE)
}

/// Trim a raw field and map blanks and the sentinel to `None`.
pub fn optional_text(raw: impl AsRef<str>) -> Option<String> {
    let raw = raw.as_ref();
    has_value(raw).then(|| raw.trim().to_string())
}

/// Same as [`optional_text`] for an already optional input.
pub fn present(raw: Option<String>) -> Option<String> {
    raw.and_then(optional_text)
}

/// Serde adapter: `#[serde(default, deserialize_with = "deserialize_optional_text")]`.
pub fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(present(raw))
}
