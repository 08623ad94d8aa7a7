use chrono::DateTime;

/// Compact gp amount, e.g. `1.50K`, `2.25M`, `1.00B`.
pub fn shorten_gp(amount: i64) -> String {
    let value = amount as f64;

    if amount > 1_000_000_000 {
        format!("{:.2}B", value / 1_000_000_000.0)
    } else if amount > 1_000_000 {
        format!("{:.2}M", value / 1_000_000.0)
    } else if amount > 1_000 {
        format!("{:.2}K", value / 1_000.0)
    } else {
        amount.to_string()
    }
}

/// Render a millisecond timestamp as `YYYY-MM-DD\nHH:MM:SS` (UTC).
pub fn format_last_updated(millis: i64) -> String {
    if millis <= 0 {
        return "No data".to_string();
    }

    match DateTime::from_timestamp_millis(millis) {
        Some(ts) => ts.format("%Y-%m-%d\n%H:%M:%S").to_string(),
        None => "No data".to_string(),
    }
}
