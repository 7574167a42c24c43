//! Resolving the server's configured timezone.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Get the current UTC offset of a canonical timezone, e.g. "America/Sao_Paulo".
///
/// Returns `None` if the timezone name is not known.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// Today's date in `local_timezone`, or in UTC if the timezone is not known.
pub fn local_today(local_timezone: &str) -> time::Date {
    let offset = get_local_offset(local_timezone).unwrap_or_else(|| {
        tracing::warn!("unknown timezone \"{local_timezone}\", using UTC");
        UtcOffset::UTC
    });

    OffsetDateTime::now_utc().to_offset(offset).date()
}
