/// Render a duration in seconds the way the console shows online and idle
/// times: `45s`, `12m`, `2h 30m`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };

    if total < 60 {
        format!("{total}s")
    } else if total < 3600 {
        format!("{}m", total / 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}

/// Account family label shown next to every user and session.
pub fn network_label(is_icq: bool) -> &'static str {
    if is_icq {
        "ICQ"
    } else {
        "AIM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_buckets() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(45.9), "45s");
        assert_eq!(format_duration(60.0), "1m");
        assert_eq!(format_duration(3599.0), "59m");
        assert_eq!(format_duration(3600.0), "1h 0m");
        assert_eq!(format_duration(9000.0), "2h 30m");
    }

    #[test]
    fn test_format_duration_rejects_garbage() {
        assert_eq!(format_duration(-5.0), "0s");
        assert_eq!(format_duration(f64::NAN), "0s");
    }
}
