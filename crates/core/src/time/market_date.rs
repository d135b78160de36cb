use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate};

/// Converts a bar timestamp (UTC seconds) into the exchange-local trading date.
///
/// Daily bars are stamped at the session open in UTC, which for exchanges far east of UTC falls on
/// the previous UTC calendar day. Shifting by the exchange's own offset gives the local date.
pub fn trading_date(timestamp: i64, gmtoffset_secs: i32) -> anyhow::Result<NaiveDate> {
    let offset = FixedOffset::east_opt(gmtoffset_secs)
        .with_context(|| format!("invalid exchange gmtoffset: {gmtoffset_secs}"))?;
    let utc = DateTime::from_timestamp(timestamp, 0)
        .with_context(|| format!("timestamp out of range: {timestamp}"))?;
    Ok(utc.with_timezone(&offset).date_naive())
}
