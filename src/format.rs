//! Rendering of measured durations for reports.
//!
//! Related timings are shown in one common unit, picked from the first value,
//! so a column of results lines up:
//!
//! ```
//! use multibench::format::format_time_strings;
//!
//! assert_eq!(
//!     format_time_strings(&[0.0025, 0.0031, 0.01]),
//!     ["2.5 ms", "3.1 ms", "10 ms"]
//! );
//! ```

use std::fmt;

/// Display unit for a group of durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Seconds.
    Seconds,
    /// Milliseconds.
    Milliseconds,
    /// Microseconds.
    Microseconds,
    /// Nanoseconds.
    Nanoseconds,
}

impl TimeUnit {
    /// Largest unit in which `seconds` is at least one.
    ///
    /// Anything below a microsecond, including zero, is shown in nanoseconds.
    pub fn for_seconds(seconds: f64) -> Self {
        if seconds >= 1.0 {
            TimeUnit::Seconds
        } else if seconds >= 1.0e-3 {
            TimeUnit::Milliseconds
        } else if seconds >= 1.0e-6 {
            TimeUnit::Microseconds
        } else {
            TimeUnit::Nanoseconds
        }
    }

    /// Multiplier converting seconds into this unit.
    pub fn scale(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1.0e3,
            TimeUnit::Microseconds => 1.0e6,
            TimeUnit::Nanoseconds => 1.0e9,
        }
    }

    /// Unit suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
            TimeUnit::Nanoseconds => "ns",
        }
    }

    /// Render `seconds` in this unit, e.g. `"2.5 ms"`.
    pub fn format(self, seconds: f64) -> String {
        format!("{} {}", significant(seconds * self.scale(), 6), self.suffix())
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Render durations (in seconds) in the unit chosen by the first one.
///
/// Returns an empty vector for empty input.
pub fn format_time_strings(times: &[f64]) -> Vec<String> {
    let Some(&first) = times.first() else {
        return Vec::new();
    };
    let unit = TimeUnit::for_seconds(first);
    times.iter().map(|&t| unit.format(t)).collect()
}

/// Format `value` with at most `digits` significant digits, trimming trailing
/// zeros, like C's `%g`: exponent notation below 1e-4 or once the rounded
/// value needs more than `digits` integer digits.
fn significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }

    let precision = digits.max(1);
    let scientific = format!("{value:.prec$e}", prec = precision - 1);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().unwrap_or(0)),
        None => return scientific,
    };

    if exponent < -4 || exponent >= precision as i64 {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        );
    }

    let decimals = (precision as i64 - 1 - exponent) as usize;
    trim_fraction(&format!("{value:.decimals$}")).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
