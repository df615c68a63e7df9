//! Date normalization for hand-typed input.
//!
//! The counter staff type dates as `DD-MM-YY`, `DD/MM/YYYY`, `D/M/YY` or a
//! bare run of digits. [`normalize`] turns any complete form into a calendar
//! date; [`reformat`] is the keystroke-level formatter that keeps a half-typed
//! field in a shape that will still parse once the user finishes it.

use chrono::NaiveDate;
use std::fmt;

use crate::fields::has_value;

const SEPARATORS: [char; 2] = ['-', '/'];

/// Highest leading digit that can still start a two-digit day (`3x`).
const DAY_MAX_LEAD: u8 = b'3';
/// Highest leading digit that can still start a two-digit month (`1x`).
const MONTH_MAX_LEAD: u8 = b'1';
const DAY_MAX: u32 = 31;
const MONTH_MAX: u32 = 12;

/// Component of a `DD-MM-YYYY` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComponent {
    Day,
    Month,
    Year,
}

impl fmt::Display for DateComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        })
    }
}

/// Reasons a date string could not be turned into a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    /// Nothing was entered
    #[error("Date is empty")]
    Empty,

    /// Day, month and year were not all present
    #[error("Expected day, month and year; found {found} component(s)")]
    Incomplete { found: usize },

    /// Something other than a digit or separator
    #[error("Invalid character '{0}' in date")]
    InvalidCharacter(char),

    /// A component with the wrong number of digits
    #[error("Invalid {component}: '{value}'")]
    InvalidComponent {
        component: DateComponent,
        value: String,
    },

    /// Well-formed components that name no real day, e.g. 31-02-2025
    #[error("{day:02}-{month:02}-{year:04} is not a calendar date")]
    NotACalendarDate { day: u32, month: u32, year: i32 },
}

/// Expand a two-digit year: `00..=50` is 20xx, `51..=99` is 19xx.
pub fn expand_year(two_digit: u32) -> i32 {
    let value = two_digit as i32;
    if value <= 50 {
        2000 + value
    } else {
        1900 + value
    }
}

/// Parse a complete date string.
///
/// Out-of-range days clamp to 31 and months to 12 before the calendar check,
/// so `45-13-2025` reads as `31-12-2025` while `31-02-2025` is rejected.
pub fn normalize(raw: &str) -> Result<NaiveDate, NormalizationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizationError::Empty);
    }
    check_characters(trimmed)?;

    let parts = components(trimmed);
    let filled = parts.iter().filter(|p| !p.is_empty()).count();
    if parts.len() != 3 || filled != 3 {
        let found = if parts.len() > 3 { parts.len() } else { filled };
        return Err(NormalizationError::Incomplete { found });
    }

    let day = parse_field(&fix_field(&parts[0], DAY_MAX_LEAD, DAY_MAX), DateComponent::Day)?;
    let month = parse_field(
        &fix_field(&parts[1], MONTH_MAX_LEAD, MONTH_MAX),
        DateComponent::Month,
    )?;
    let year = parse_year(&parts[2])?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(NormalizationError::NotACalendarDate { day, month, year })
}

/// Parse a field that may legitimately be left blank (or `N/A`).
pub fn normalize_optional(raw: &str) -> Result<Option<NaiveDate>, NormalizationError> {
    if !has_value(raw) {
        return Ok(None);
    }
    normalize(raw).map(Some)
}

/// Canonical `DD-MM-YYYY` rendering.
pub fn to_canonical(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Keystroke formatter for a date field.
///
/// Applies the typing fixes (a day starting with 4-9 or a month starting with
/// 2-9 gets a leading `0`, two-digit overflow clamps to 31/12) and commits the
/// canonical `DD-MM-YYYY` form only once day, month and a two- or four-digit
/// year are all present. Anything else comes back as typed, so the user can
/// keep editing without an early error.
pub fn reformat(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || check_characters(trimmed).is_err() {
        return raw.to_string();
    }

    let separator = trimmed
        .chars()
        .find(|c| SEPARATORS.contains(c))
        .unwrap_or('-');

    let mut parts = components(trimmed);
    if let Some(day) = parts.get_mut(0) {
        *day = fix_field(day, DAY_MAX_LEAD, DAY_MAX);
    }
    if let Some(month) = parts.get_mut(1) {
        *month = fix_field(month, MONTH_MAX_LEAD, MONTH_MAX);
    }

    match commit(&parts) {
        Some(committed) => committed,
        None => parts.join(&separator.to_string()),
    }
}

fn check_characters(raw: &str) -> Result<(), NormalizationError> {
    match raw
        .chars()
        .find(|c| !c.is_ascii_digit() && !SEPARATORS.contains(c))
    {
        Some(c) => Err(NormalizationError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

/// Split on separators; a bare digit run is cut with the typing mask instead.
fn components(raw: &str) -> Vec<String> {
    if raw.contains(SEPARATORS) {
        raw.split(SEPARATORS).map(str::to_string).collect()
    } else {
        mask_digits(raw)
    }
}

/// `24012025` -> `["24", "01", "2025"]`, `5` -> `["05"]`, `240` -> `["24", "0"]`.
fn mask_digits(digits: &str) -> Vec<String> {
    let mut parts = Vec::with_capacity(3);

    let (day, rest) = take_field(digits, DAY_MAX_LEAD);
    if day.is_empty() {
        return parts;
    }
    parts.push(day);

    let (month, rest) = take_field(rest, MONTH_MAX_LEAD);
    if month.is_empty() {
        return parts;
    }
    parts.push(month);

    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Take up to two digits off the front. A lead digit above `max_lead` cannot
/// start a two-digit value, so it stands alone behind a `0`.
fn take_field(digits: &str, max_lead: u8) -> (String, &str) {
    match digits.as_bytes().first() {
        None => (String::new(), digits),
        Some(&lead) if lead > max_lead => (format!("0{}", lead as char), &digits[1..]),
        Some(_) => {
            let width = digits.len().min(2);
            (digits[..width].to_string(), &digits[width..])
        }
    }
}

fn fix_field(field: &str, max_lead: u8, max_value: u32) -> String {
    match field.as_bytes() {
        [lead] if *lead > max_lead => format!("0{field}"),
        [_, _] => match field.parse::<u32>() {
            Ok(value) if value > max_value => max_value.to_string(),
            _ => field.to_string(),
        },
        _ => field.to_string(),
    }
}

fn parse_field(field: &str, component: DateComponent) -> Result<u32, NormalizationError> {
    let invalid = || NormalizationError::InvalidComponent {
        component,
        value: field.to_string(),
    };
    if field.is_empty() || field.len() > 2 {
        return Err(invalid());
    }
    field.parse().map_err(|_| invalid())
}

fn parse_year(field: &str) -> Result<i32, NormalizationError> {
    let invalid = || NormalizationError::InvalidComponent {
        component: DateComponent::Year,
        value: field.to_string(),
    };
    match field.len() {
        2 => field.parse::<u32>().map(expand_year).map_err(|_| invalid()),
        4 => field.parse::<i32>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn commit(parts: &[String]) -> Option<String> {
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    if parts[0].len() > 2 || parts[1].len() > 2 {
        return None;
    }
    let year = match parts[2].len() {
        2 => expand_year(parts[2].parse().ok()?).to_string(),
        4 => parts[2].clone(),
        _ => return None,
    };
    Some(format!("{:0>2}-{:0>2}-{}", parts[0], parts[1], year))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_accepted_forms() {
        assert_eq!(normalize("24-01-2025").unwrap(), date(2025, 1, 24));
        assert_eq!(normalize("24/01/2025").unwrap(), date(2025, 1, 24));
        assert_eq!(normalize("24/1/25").unwrap(), date(2025, 1, 24));
        assert_eq!(normalize(" 5-3-2024 ").unwrap(), date(2024, 3, 5));
        assert_eq!(normalize("24012025").unwrap(), date(2025, 1, 24));
        assert_eq!(normalize("240125").unwrap(), date(2025, 1, 24));
    }

    #[test]
    fn test_two_digit_year_expansion() {
        assert_eq!(normalize("01-01-25").unwrap(), date(2025, 1, 1));
        assert_eq!(normalize("01-01-75").unwrap(), date(1975, 1, 1));
        assert_eq!(normalize("01-01-50").unwrap(), date(2050, 1, 1));
        assert_eq!(normalize("01-01-51").unwrap(), date(1951, 1, 1));
        assert_eq!(normalize("01-01-00").unwrap(), date(2000, 1, 1));
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        assert_eq!(normalize("45-13-2025").unwrap(), date(2025, 12, 31));
        assert_eq!(normalize("32-01-2025").unwrap(), date(2025, 1, 31));
    }

    #[test]
    fn test_impossible_dates_fail() {
        assert_eq!(
            normalize("31-02-2025").unwrap_err(),
            NormalizationError::NotACalendarDate {
                day: 31,
                month: 2,
                year: 2025
            }
        );
        assert!(matches!(
            normalize("00-01-2025"),
            Err(NormalizationError::NotACalendarDate { .. })
        ));
        assert_eq!(normalize("29-02-2024").unwrap(), date(2024, 2, 29));
        assert!(normalize("29-02-2023").is_err());
    }

    #[test]
    fn test_malformed_input_errors() {
        assert_eq!(normalize("").unwrap_err(), NormalizationError::Empty);
        assert_eq!(
            normalize("24-01").unwrap_err(),
            NormalizationError::Incomplete { found: 2 }
        );
        assert_eq!(
            normalize("24-01-").unwrap_err(),
            NormalizationError::Incomplete { found: 2 }
        );
        assert_eq!(
            normalize("24.01.2025").unwrap_err(),
            NormalizationError::InvalidCharacter('.')
        );
        assert!(matches!(
            normalize("24-01-202"),
            Err(NormalizationError::InvalidComponent {
                component: DateComponent::Year,
                ..
            })
        ));
        assert!(matches!(
            normalize("124-01-2025"),
            Err(NormalizationError::InvalidComponent {
                component: DateComponent::Day,
                ..
            })
        ));
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional("").unwrap(), None);
        assert_eq!(normalize_optional("N/A").unwrap(), None);
        assert_eq!(
            normalize_optional("01-03-2025").unwrap(),
            Some(date(2025, 3, 1))
        );
        assert!(normalize_optional("31-02-2025").is_err());
    }

    #[test]
    fn test_canonical_round_trip() {
        let parsed = normalize("5/3/24").unwrap();
        assert_eq!(to_canonical(parsed), "05-03-2024");
        assert_eq!(normalize(&to_canonical(parsed)).unwrap(), parsed);
    }

    #[test]
    fn test_reformat_while_typing() {
        assert_eq!(reformat("1"), "1");
        assert_eq!(reformat("5"), "05");
        assert_eq!(reformat("12-3"), "12-03");
        assert_eq!(reformat("12/1"), "12/1");
        assert_eq!(reformat("05-"), "05-");
        assert_eq!(reformat("24-01-2"), "24-01-2");
        assert_eq!(reformat("2401"), "24-01");
        assert_eq!(reformat("240"), "24-0");
        assert_eq!(reformat("4"), "04");
    }

    #[test]
    fn test_reformat_commits_complete_dates() {
        assert_eq!(reformat("24-01-25"), "24-01-2025");
        assert_eq!(reformat("24/1/2025"), "24-01-2025");
        assert_eq!(reformat("1/1/75"), "01-01-1975");
        assert_eq!(reformat("24012025"), "24-01-2025");
        assert_eq!(reformat("40-01-2025"), "31-01-2025");
        // Committed even though February has no 31st; normalize reports it.
        assert_eq!(reformat("31-02-2025"), "31-02-2025");
    }

    #[test]
    fn test_reformat_leaves_garbage_alone() {
        assert_eq!(reformat("abc"), "abc");
        assert_eq!(reformat(""), "");
    }
}
