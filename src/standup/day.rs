//! Calendar day in a member's own timezone.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Format of the `date` key of a stand-up record.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The member's local date at `now`, given an IANA timezone name such as
/// `Asia/Tokyo`.
pub fn local_day(timezone: &str, now: DateTime<Utc>) -> Result<String> {
    let tz: Tz = timezone
        .parse()
        .map_err(|e| anyhow!("unknown timezone {timezone:?}: {e}"))?;
    Ok(now.with_timezone(&tz).format(DATE_FORMAT).to_string())
}
