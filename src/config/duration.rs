//! Parsing for human-readable duration strings like "30s", "5m", "500ms".

use std::time::Duration;

/// Parse a duration string.
///
/// Supported suffixes: `ms` (milliseconds), `s` (seconds), `m` (minutes).
/// A bare number is interpreted as seconds. Returns `None` for anything else.
///
/// # Examples
///
/// ```
/// use empleos_deploy::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
/// assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
/// assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
/// ```
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.parse::<u64>().ok().map(Duration::from_secs);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60));
    }
    s.parse::<u64>().ok().map(Duration::from_secs)
}
