//! Human-readable playback clock formatting
//!
//! Transport time and length are milliseconds; the host shows them as
//! `hh:mm:ss`.

const MS_PER_SECOND: i64 = 1000;
const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;

/// Format milliseconds as `hh:mm:ss`.
///
/// Hours are not wrapped at 24. Negative input (an engine reporting "unknown")
/// is shown as zero.
///
/// # Examples
///
/// ```
/// use videokit_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0), "00:00:00");
/// assert_eq!(format_clock(65_999), "00:01:05");
/// assert_eq!(format_clock(3_723_000), "01:02:03");
/// ```
pub fn format_clock(ms: i64) -> String {
    let total_seconds = ms.max(0) / MS_PER_SECOND;
    let hours = total_seconds / SECONDS_PER_HOUR;
    let minutes = (total_seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let seconds = total_seconds % SECONDS_PER_MINUTE;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Format a `time/length` pair the way the host transport panel shows it
///
/// ```
/// use videokit_common::human_time::format_progress;
///
/// assert_eq!(format_progress(15_000, 734_000), "00:00:15/00:12:14");
/// ```
pub fn format_progress(time_ms: i64, length_ms: i64) -> String {
    format!("{}/{}", format_clock(time_ms), format_clock(length_ms))
}
