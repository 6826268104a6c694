use crate::error::{CoreError, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current instant in UTC.
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Render a timestamp as ISO-8601 / RFC 3339.
///
/// The output is what policy hashes and cached field maps carry, so
/// `parse_timestamp(format_timestamp(t)?)` must give back `t` exactly.
pub fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    Ok(value.format(&Rfc3339)?)
}

pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| {
        CoreError::invalid_timestamp(format!("Failed to parse timestamp '{value}': {e}"))
    })
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}
