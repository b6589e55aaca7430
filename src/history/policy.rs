//! History configuration: size cap, load-time expiration and the
//! display format for capture times.
//!
//! The store reads the first two but does not own them. The settings
//! surface (CLI flags, `configure` requests) supplies them through a
//! `watch` channel.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
/// A "month" preset is a fixed 30 days.
const MONTH: u64 = 30 * DAY;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*([smhdw])$").expect("duration regex is valid"));

/// Errors from parsing an expiration policy.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unrecognized expiration policy: {0:?} (expected never, hour, day, week, month or <n>[smhdw])")]
    Unrecognized(String),
    #[error("expiration window must be non-zero")]
    ZeroWindow,
    #[error("unrecognized time format: {0:?} (expected one of {formats})", formats = TimeFormat::PATTERNS.join(", "))]
    UnknownTimeFormat(String),
}

/// When persisted entries are dropped at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ExpirationPolicy {
    #[default]
    Never,
    OlderThan(Duration),
}

impl ExpirationPolicy {
    /// Oldest admissible `captured_at` (epoch millis) given the current
    /// time, or `None` when nothing expires.
    ///
    /// Entries with `captured_at >= cutoff` survive.
    pub fn cutoff(&self, now_millis: u64) -> Option<u64> {
        match self {
            ExpirationPolicy::Never => None,
            ExpirationPolicy::OlderThan(window) => {
                let window_millis = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
                Some(now_millis.saturating_sub(window_millis))
            }
        }
    }
}

/// Returns the window for a named preset, or `None` if the name is not
/// one of the settings-surface presets.
fn preset_window(name: &str) -> Option<Duration> {
    match name {
        "hour" => Some(Duration::from_secs(HOUR)),
        "day" => Some(Duration::from_secs(DAY)),
        "week" => Some(Duration::from_secs(WEEK)),
        "month" => Some(Duration::from_secs(MONTH)),
        _ => None,
    }
}

impl FromStr for ExpirationPolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "never" {
            return Ok(ExpirationPolicy::Never);
        }
        if let Some(window) = preset_window(&s) {
            return Ok(ExpirationPolicy::OlderThan(window));
        }

        let caps = DURATION_RE
            .captures(&s)
            .ok_or_else(|| PolicyError::Unrecognized(s.clone()))?;
        let count: u64 = caps[1]
            .parse()
            .map_err(|_| PolicyError::Unrecognized(s.clone()))?;
        let unit = match &caps[2] {
            "s" => 1,
            "m" => 60,
            "h" => HOUR,
            "d" => DAY,
            _ => WEEK,
        };
        if count == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        let secs = count
            .checked_mul(unit)
            .ok_or_else(|| PolicyError::Unrecognized(s.clone()))?;
        Ok(ExpirationPolicy::OlderThan(Duration::from_secs(secs)))
    }
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationPolicy::Never => f.write_str("never"),
            ExpirationPolicy::OlderThan(window) => match window.as_secs() {
                HOUR => f.write_str("hour"),
                DAY => f.write_str("day"),
                WEEK => f.write_str("week"),
                MONTH => f.write_str("month"),
                secs => write!(f, "{secs}s"),
            },
        }
    }
}

impl From<ExpirationPolicy> for String {
    fn from(policy: ExpirationPolicy) -> Self {
        policy.to_string()
    }
}

impl TryFrom<String> for ExpirationPolicy {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How capture times are shown by the client.
///
/// Named by the date patterns users pick from (`HH:mm`,
/// `yyyy-MM-dd HH:mm`, ...); each maps to a chrono format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TimeFormat {
    #[default]
    HourMinute,
    HourMinuteSecond,
    Date,
    DateTime,
    LongDate,
    LongDateTime,
}

impl TimeFormat {
    const ALL: [TimeFormat; 6] = [
        TimeFormat::HourMinute,
        TimeFormat::HourMinuteSecond,
        TimeFormat::Date,
        TimeFormat::DateTime,
        TimeFormat::LongDate,
        TimeFormat::LongDateTime,
    ];

    /// Accepted pattern names, in menu order.
    pub const PATTERNS: [&str; 6] = [
        "HH:mm",
        "HH:mm:ss",
        "yyyy-MM-dd",
        "yyyy-MM-dd HH:mm",
        "MMM d, yyyy",
        "MMM d, yyyy HH:mm",
    ];

    pub fn pattern(self) -> &'static str {
        Self::PATTERNS[self as usize]
    }

    /// chrono `strftime` equivalent of [`Self::pattern`].
    pub fn strftime(self) -> &'static str {
        match self {
            TimeFormat::HourMinute => "%H:%M",
            TimeFormat::HourMinuteSecond => "%H:%M:%S",
            TimeFormat::Date => "%Y-%m-%d",
            TimeFormat::DateTime => "%Y-%m-%d %H:%M",
            TimeFormat::LongDate => "%b %-d, %Y",
            TimeFormat::LongDateTime => "%b %-d, %Y %H:%M",
        }
    }
}

impl FromStr for TimeFormat {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.pattern() == s)
            .ok_or_else(|| PolicyError::UnknownTimeFormat(s.to_string()))
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

impl From<TimeFormat> for String {
    fn from(format: TimeFormat) -> Self {
        format.pattern().to_string()
    }
}

impl TryFrom<String> for TimeFormat {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Persisted settings. The store reads the limit on every upsert and
/// the expiration at load; the time format is for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub history_limit: usize,
    pub expiration: ExpirationPolicy,
    /// Absent in settings written before the field existed.
    #[serde(default)]
    pub time_format: TimeFormat,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            expiration: ExpirationPolicy::Never,
            time_format: TimeFormat::default(),
        }
    }
}
