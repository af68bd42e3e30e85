use chrono::{DateTime, Local, Utc};

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    let Some(ts) = timestamp else {
        return "-".to_string();
    };
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn preview_text(input: &str, max_len: usize) -> String {
    let single_line = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_len {
        return single_line;
    }

    let mut preview = single_line.chars().take(max_len).collect::<String>();
    preview.push('…');
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_collapses_whitespace_and_truncates() {
        assert_eq!(preview_text("a\n  b", 10), "a b");
        assert_eq!(preview_text("日本語のテキスト", 3), "日本語…");
    }

    #[test]
    fn missing_timestamp_is_dash() {
        assert_eq!(format_timestamp(None), "-");
    }
}
