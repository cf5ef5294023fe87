//! Partition keys.
//!
//! Tasks are stored per (date, profile):
//!
//! ```text
//! tasks_2026-10-16          default profile
//! tasks_Home_2026-10-16     profile "Home"
//! tasks                     legacy, undated (pre-partition schema)
//! ```
//!
//! A profile name may not itself look like a date, so `tasks_<date>` can only
//! ever belong to the default profile.

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Name of the distinguished default profile
pub const DEFAULT_PROFILE: &str = "Default";

/// Prefix shared by every dated partition key
pub const TASKS_KEY_PREFIX: &str = "tasks_";

/// Undated key written by the pre-partition schema
pub const LEGACY_TASKS_KEY: &str = "tasks";

/// Key holding the JSON array of profile names
pub const PROFILES_KEY: &str = "profiles";

/// Key holding the last selected profile name
pub const SELECTED_PROFILE_KEY: &str = "selected_profile";

const ISO_DATE_LEN: usize = 10;
const MAX_PROFILE_NAME_LEN: usize = 64;

/// Whether `profile` is the default profile.
pub fn is_default_profile(profile: &str) -> bool {
    profile == DEFAULT_PROFILE
}

/// Storage key for the (date, profile) partition.
pub fn partition_key(date: NaiveDate, profile: &str) -> String {
    let date = format_date(date);
    if is_default_profile(profile) {
        format!("{TASKS_KEY_PREFIX}{date}")
    } else {
        format!("{TASKS_KEY_PREFIX}{profile}_{date}")
    }
}

/// Date of `key` if it is a dated partition of `profile`.
///
/// The date suffix must be a strictly shaped, valid `YYYY-MM-DD`; anything
/// else (another profile's key, the legacy key, a malformed date) is `None`.
pub fn partition_date(key: &str, profile: &str) -> Option<NaiveDate> {
    let rest = key.strip_prefix(TASKS_KEY_PREFIX)?;
    if is_default_profile(profile) {
        return parse_iso_date(rest);
    }

    let rest = rest.strip_prefix(profile)?;
    let date = rest.strip_prefix('_')?;
    parse_iso_date(date)
}

/// Strict `YYYY-MM-DD` parser: exact length, ASCII digits, zero padded.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    if !looks_like_iso_date(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Parse a user supplied date argument.
pub fn parse_date_arg(raw: &str) -> Result<NaiveDate> {
    parse_iso_date(raw.trim()).ok_or_else(|| Error::InvalidDate(raw.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Shape check for `\d{4}-\d{2}-\d{2}` without validating the calendar.
pub fn looks_like_iso_date(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == ISO_DATE_LEN
        && bytes.iter().enumerate().all(|(idx, byte)| match idx {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// Validate and normalize (trim) a profile name.
///
/// Names end up inside storage keys and note paths, so a name may not look
/// like a date, contain a path separator, or be `.`/`..`.
pub fn validate_profile_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    let reject = |reason: &str| Error::InvalidProfileName {
        name: raw.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(reject("name cannot be empty"));
    }
    if name.chars().count() > MAX_PROFILE_NAME_LEN {
        return Err(reject("name is longer than 64 characters"));
    }
    if name.chars().any(char::is_control) {
        return Err(reject("name cannot contain control characters"));
    }
    if looks_like_iso_date(name) {
        return Err(reject("name cannot look like a date (YYYY-MM-DD)"));
    }
    if name.contains(['/', '\\']) {
        return Err(reject("name cannot contain path separators"));
    }
    if name == "." || name == ".." {
        return Err(reject("name cannot be '.' or '..'"));
    }
    Ok(name.to_string())
}
