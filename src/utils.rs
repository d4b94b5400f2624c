//! Formatting helpers shared by the job log lines and the run summary.

use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Size in mebibytes with one decimal, as shown in per-file lines.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / MIB)
}

/// Signed change from `before` to `after` in percent; positive means growth.
pub fn percent_change(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (after as f64 - before as f64) / before as f64 * 100.0
}

/// `↓ -12.3%` when the file shrank, `↑ +4.0%` when it grew.
pub fn format_change(before: u64, after: u64) -> String {
    let change = percent_change(before, after);
    if after > before {
        format!("↑ +{:.1}%", change)
    } else {
        format!("↓ -{:.1}%", change.abs())
    }
}

/// `HH:MM:SS.mmm`; hours keep growing past 99.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mb() {
        assert_eq!(format_mb(0), "0.0 MB");
        assert_eq!(format_mb(1024 * 1024 * 5 / 2), "2.5 MB");
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(1000, 800), -20.0);
        assert_eq!(percent_change(1000, 1200), 20.0);
        assert_eq!(percent_change(1000, 1000), 0.0);
        assert_eq!(percent_change(0, 500), 0.0);
    }

    #[test]
    fn test_format_change() {
        assert_eq!(format_change(1000, 750), "↓ -25.0%");
        assert_eq!(format_change(1000, 1100), "↑ +10.0%");
        assert_eq!(format_change(1000, 1000), "↓ -0.0%");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(0)), "00:00:00.000");
        assert_eq!(format_elapsed(Duration::from_millis(61_005)), "00:01:01.005");
        assert_eq!(
            format_elapsed(Duration::from_secs(3 * 3600 + 25 * 60 + 7) + Duration::from_millis(250)),
            "03:25:07.250"
        );
    }
}
