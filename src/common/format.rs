use std::time::Duration;

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// 字节数转为可读字符串: 0B, 1.5KB, 1.0MB ...
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    for unit in &UNITS[..UNITS.len() - 1] {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}{}", value, UNITS[UNITS.len() - 1])
}

/// 时长格式: 59.9s, 1m0s, 1h1m1s
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        return format!("{:.1}s", secs);
    }

    let total = duration.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h == 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}h{}m{}s", h, m, s)
    }
}

/// 超过 `width` 个字符时截断并以 "..." 结尾
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1023), "1023B");
        assert_eq!(format_bytes(1536), "1.5KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0GB");
        assert_eq!(format_bytes(2048 * 1024 * 1024 * 1024 * 1024), "2048.0TB");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(59_900)), "59.9s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m0s");
        assert_eq!(format_duration(Duration::from_secs(3599)), "59m59s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");
        assert_eq!(format_duration(Duration::ZERO), "0.0s");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate("short", 33), "short");
        let long = "https://example.com/a/very/long/path/file.bin";
        let cut = truncate(long, 33);
        assert_eq!(cut.chars().count(), 33);
        assert!(cut.ends_with("..."));
        assert!(long.starts_with(&cut[..30]));
    }
}
