use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current unix timestamp in seconds.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Seconds elapsed since UTC midnight for a unix timestamp.
pub fn seconds_since_midnight(unix_secs: u64) -> u64 {
    unix_secs % 86_400
}

/// UTC day number for a unix timestamp (used to de-duplicate daily sends).
pub fn day_number(unix_secs: u64) -> u64 {
    unix_secs / 86_400
}

/// Parse a wall-clock `HH:MM` string into seconds since midnight.
pub fn parse_hhmm(raw: &str) -> Option<u64> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let hours = hours.parse::<u64>().ok()?;
    let minutes = minutes.parse::<u64>().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 3_600 + minutes * 60)
}

#[cfg(test)]
mod tests {
    use super::{day_number, parse_hhmm, seconds_since_midnight};

    #[test]
    fn parses_wall_clock_times() {
        assert_eq!(parse_hhmm("00:00"), Some(0));
        assert_eq!(parse_hhmm("07:30"), Some(27_000));
        assert_eq!(parse_hhmm("  23:59 "), Some(86_340));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("12:60"), None);
        assert_eq!(parse_hhmm("0730"), None);
        assert_eq!(parse_hhmm(""), None);
    }

    #[test]
    fn midnight_math() {
        assert_eq!(seconds_since_midnight(86_400), 0);
        assert_eq!(seconds_since_midnight(86_400 + 27_000), 27_000);
        assert_eq!(day_number(86_399), 0);
        assert_eq!(day_number(86_400), 1);
    }
}
