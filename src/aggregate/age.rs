use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Whole days between two instants, rounded up. Direction is ignored.
pub fn days_between(created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (now - created).num_seconds().abs();
    (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// Bucket a day count into a human string. Resolution stops at days.
pub fn format_days(days: i64) -> String {
    match days {
        i64::MIN..=0 => "today".to_string(),
        1 => "1 day ago".to_string(),
        2..=6 => format!("{} days ago", days),
        7..=29 => plural(days / 7, "week"),
        _ => plural(days / 30, "month"),
    }
}

pub fn relative_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_days(days_between(created, now))
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
