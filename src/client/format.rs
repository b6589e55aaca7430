//! Output formatting for CLI client commands.
//!
//! Human-readable tables and status lines. For `get`, metadata goes to
//! stderr and raw content to stdout so that piping works naturally
//! (`clipkeepd client get 0 > out.png`).

use std::fmt;
use std::io::{self, Write};

use chrono::{Local, TimeZone};

use crate::history::TimeFormat;
use crate::ipc::protocol::{ConfigDescriptor, EntryDescriptor};

use super::daemon_client::FetchedEntry;

/// Print entry descriptors as a table to stdout. Capture times are
/// shown in local time.
pub fn print_entries(entries: &[EntryDescriptor], time_format: TimeFormat) {
    if entries.is_empty() {
        println!("History is empty");
        return;
    }

    let captured: Vec<String> = entries
        .iter()
        .map(|e| format_timestamp(e.captured_at, time_format, &Local))
        .collect();
    let width = captured
        .iter()
        .map(|s| s.chars().count())
        .max()
        .unwrap_or(0)
        .max("CAPTURED".len());

    println!("{:>5} {:<6} {:>10} {:<width$}  PREVIEW", "INDEX", "KIND", "SIZE", "CAPTURED");
    println!("{}", "-".repeat(72));
    for (e, at) in entries.iter().zip(&captured) {
        println!(
            "{:>5} {:<6} {:>10} {:<width$}  {}",
            e.index, e.kind, e.byte_length, at, e.preview,
        );
    }
}

/// Metadata to stderr, raw content to stdout.
pub fn print_entry(
    index: u32,
    entry: &FetchedEntry,
    time_format: TimeFormat,
    now_millis: u64,
) -> Result<(), io::Error> {
    eprintln!("Index:    {index}");
    eprintln!("Kind:     {}", entry.kind);
    eprintln!("Size:     {} bytes", entry.content.len());
    eprintln!(
        "Captured: {} ({} ago)",
        format_timestamp(entry.captured_at, time_format, &Local),
        format_age(entry.captured_at, now_millis),
    );
    eprintln!("---");
    let mut stdout = io::stdout().lock();
    stdout.write_all(&entry.content)?;
    stdout.flush()
}

pub fn print_config(config: &ConfigDescriptor) {
    println!("history_limit: {}", config.history_limit);
    println!("expiration:    {}", config.expiration);
    println!("time_format:   {}", config.time_format);
}

/// Render epoch millis in `tz`. Out-of-range timestamps print as `-`.
fn format_timestamp<Tz>(captured_at: u64, time_format: TimeFormat, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let millis = i64::try_from(captured_at).unwrap_or(i64::MAX);
    match tz.timestamp_millis_opt(millis).single() {
        Some(at) => at.format(time_format.strftime()).to_string(),
        None => "-".to_string(),
    }
}

/// Compact age: the largest whole unit among s, m, h, d.
fn format_age(captured_at: u64, now_millis: u64) -> String {
    let secs = now_millis.saturating_sub(captured_at) / 1000;
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m", secs / 60),
        3600..86400 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86400),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    /// 2023-11-14 22:13:20 UTC.
    const NOV_14: u64 = 1_700_000_000_000;
    /// 2023-11-05 16:00:00 UTC.
    const NOV_5: u64 = 1_699_200_000_000;

    #[test]
    fn timestamp_time_of_day() {
        assert_eq!(format_timestamp(NOV_14, TimeFormat::HourMinute, &Utc), "22:13");
        assert_eq!(
            format_timestamp(NOV_14, TimeFormat::HourMinuteSecond, &Utc),
            "22:13:20"
        );
    }

    #[test]
    fn timestamp_dates() {
        assert_eq!(format_timestamp(NOV_5, TimeFormat::Date, &Utc), "2023-11-05");
        assert_eq!(
            format_timestamp(NOV_14, TimeFormat::DateTime, &Utc),
            "2023-11-14 22:13"
        );
    }

    #[test]
    fn timestamp_long_dates_drop_day_padding() {
        assert_eq!(format_timestamp(NOV_5, TimeFormat::LongDate, &Utc), "Nov 5, 2023");
        assert_eq!(
            format_timestamp(NOV_14, TimeFormat::LongDateTime, &Utc),
            "Nov 14, 2023 22:13"
        );
    }

    #[test]
    fn timestamp_out_of_range() {
        assert_eq!(format_timestamp(u64::MAX, TimeFormat::Date, &Utc), "-");
    }

    #[test]
    fn age_seconds() {
        assert_eq!(format_age(1_000, 43_500), "42s");
    }

    #[test]
    fn age_minutes_and_hours() {
        assert_eq!(format_age(0, 5 * 60_000 + 999), "5m");
        assert_eq!(format_age(0, 3 * 3_600_000), "3h");
    }

    #[test]
    fn age_days() {
        assert_eq!(format_age(0, 2 * 86_400_000), "2d");
    }

    #[test]
    fn age_future_timestamp_is_zero() {
        assert_eq!(format_age(10_000, 5_000), "0s");
    }
}
