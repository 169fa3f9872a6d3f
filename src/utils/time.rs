use chrono::{DateTime, FixedOffset, Offset, Utc};

/// India Standard Time, UTC+05:30.
const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

pub fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// Current wall-clock time in India Standard Time
pub fn get_ist_time() -> DateTime<FixedOffset> {
    to_ist(Utc::now())
}

pub fn to_ist(timestamp: DateTime<Utc>) -> DateTime<FixedOffset> {
    timestamp.with_timezone(&ist_offset())
}

/// Clock face shown on the home page, e.g. `07:45:12 PM`
pub fn format_clock(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format("%I:%M:%S %p").to_string()
}
