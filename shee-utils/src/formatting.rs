/// Substitute the `{user}` placeholder in stored template content.
///
/// Templates are generated with a literal `{user}` marker; the caller decides
/// whether that becomes a mention (`<@id>`) or a display name.
pub fn render_user_template(content: &str, user: &str) -> String {
    content.replace("{user}", user)
}

/// Format seconds into a compact human-readable duration (e.g. 59s, 1m, 1h, 1d, 1h 30m).
pub fn format_compact_duration(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        return if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        };
    }

    if hours > 0 {
        let mut parts = vec![format!("{}h", hours)];
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 {
            parts.push(format!("{}s", seconds));
        }
        return parts.join(" ");
    }

    if minutes > 0 {
        return if seconds > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}m", minutes)
        };
    }

    format!("{}s", seconds)
}

#[cfg(test)]
mod tests {
    use super::{format_compact_duration, render_user_template};

    #[test]
    fn renders_user_placeholder() {
        assert_eq!(
            render_user_template("Welcome, {user}!", "<@123>"),
            "Welcome, <@123>!"
        );
        assert_eq!(
            render_user_template("{user} {user}", "Shee"),
            "Shee Shee"
        );
        assert_eq!(render_user_template("no placeholder", "x"), "no placeholder");
    }

    #[test]
    fn compact_duration_formatting() {
        assert_eq!(format_compact_duration(59), "59s");
        assert_eq!(format_compact_duration(60), "1m");
        assert_eq!(format_compact_duration(61), "1m 1s");
        assert_eq!(format_compact_duration(600), "10m");
        assert_eq!(format_compact_duration(3600), "1h");
        assert_eq!(format_compact_duration(3670), "1h 1m 10s");
        assert_eq!(format_compact_duration(86400), "1d");
        assert_eq!(format_compact_duration(90000), "1d 1h");
    }
}
