use chrono::{DateTime, Local};
use std::time::SystemTime;

/// Converts a SystemTime to a formatted string in the local timezone
/// in the format "YYYY-MM-DD HH:MM:SS.mmm".
pub fn format_system_time(system_time: SystemTime) -> String {
    let datetime: DateTime<Local> = system_time.into();
    datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Returns the current timestamp formatted as a string in the local timezone
/// in the format "YYYY-MM-DD HH:MM:SS.mmm".
pub fn get_formatted_current_timestamp() -> String {
    format_system_time(SystemTime::now())
}

/// Whole seconds elapsed since `since`, zero if the clock went backwards.
pub fn seconds_since(since: SystemTime) -> u64 {
    SystemTime::now()
        .duration_since(since)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::time::{Duration, UNIX_EPOCH};

    const TIMESTAMP_PATTERN: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}$";

    #[test]
    fn test_format_system_time() {
        // 2023-01-01 12:00:00.250 UTC
        let test_time = UNIX_EPOCH + Duration::from_millis(1_672_574_400_250);

        let formatted = format_system_time(test_time);

        // the local timezone shifts the hour, but never the milliseconds
        let re = Regex::new(TIMESTAMP_PATTERN).unwrap();
        assert!(
            re.is_match(&formatted),
            "Formatted time doesn't match expected pattern: {}",
            formatted
        );
        assert!(formatted.ends_with(".250"), "{}", formatted);
    }

    #[test]
    fn test_get_formatted_current_timestamp() {
        let timestamp = get_formatted_current_timestamp();

        let re = Regex::new(TIMESTAMP_PATTERN).unwrap();
        assert!(
            re.is_match(&timestamp),
            "Current timestamp doesn't match expected pattern: {}",
            timestamp
        );
    }

    #[test]
    fn test_seconds_since() {
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let elapsed = seconds_since(an_hour_ago);
        assert!((3600..3610).contains(&elapsed), "{}", elapsed);

        let in_the_future = SystemTime::now() + Duration::from_secs(60);
        assert_eq!(seconds_since(in_the_future), 0);
    }
}
