//! Wire format for timestamps exchanged with the backend.
//!
//! The backend stores UTC with millisecond precision
//! (`yyyy-MM-dd'T'HH:mm:ss.SSS'Z'`). Values are kept in that canonical form
//! and only converted for display.

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use tracing::warn;

use shared_models::{AppError, AppResult};

pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";

pub fn format_wire(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses any RFC 3339 timestamp and normalizes it to UTC.
pub fn parse_wire(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::ValidationError(format!("Invalid date {:?}: {}", raw, e)))
}

/// Re-serializes a timestamp in the canonical millisecond form.
pub fn normalize_wire(raw: &str) -> AppResult<String> {
    parse_wire(raw).map(format_wire)
}

pub fn display_offset(offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
        warn!("Display offset of {} minutes is out of range, using UTC", offset_minutes);
        Utc.fix()
    })
}

/// Formats a canonical timestamp for display in the given offset.
pub fn localize(raw: &str, offset_minutes: i32) -> AppResult<String> {
    let utc = parse_wire(raw)?;
    Ok(utc
        .with_timezone(&display_offset(offset_minutes))
        .format(DISPLAY_FORMAT)
        .to_string())
}

/// Serde adapter keeping `DateTime<Utc>` fields in the canonical wire form.
/// A missing or null value reads as the current instant.
pub mod wire_serde {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_wire(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_wire(&raw).map_err(D::Error::custom),
            None => Ok(Utc::now()),
        }
    }
}
