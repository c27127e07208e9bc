//! Duration-backed lap and sector time parsing.
//!
//! The feed transmits completed times as formatted strings (`"1:31.900"`,
//! `"17.456"`, occasionally `"1:02:33.184"` for very long laps). Comparisons
//! must happen on parsed durations; comparing the formatted strings ranks
//! `"59.900"` above `"1:00.100"`.

use std::fmt;
use std::time::Duration;

/// A completed lap or sector time.
///
/// Ordering and equality are defined on the underlying [`Duration`], so a
/// collection of `LapTime`s sorts fastest-first with `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LapTime(Duration);

impl LapTime {
    /// Parse a formatted time string.
    ///
    /// Accepts `H:MM:SS.fff`, `M:SS.fff`, and bare `SS.fff` sector form.
    /// Returns `None` for blank or malformed input; callers treat that as a
    /// skippable field, not a stream error.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut fields = text.rsplit(':');
        let seconds_field = fields.next()?;
        let (whole_text, frac_text) = match seconds_field.split_once('.') {
            Some((whole, frac)) => (whole, Some(frac)),
            None => (seconds_field, None),
        };

        let seconds = parse_digits(whole_text)?;
        let nanos = match frac_text {
            Some(frac) if !frac.is_empty() && frac.len() <= 9 => {
                let scale = 10u64.pow(9 - frac.len() as u32);
                parse_digits(frac)?.checked_mul(scale)?
            }
            Some(_) => return None,
            None => 0,
        };

        let minutes = match fields.next() {
            Some(field) => parse_digits(field)?,
            None => 0,
        };
        let hours = match fields.next() {
            Some(field) => parse_digits(field)?,
            None => 0,
        };
        if fields.next().is_some() {
            return None;
        }

        let total_seconds = hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)?;
        Some(Self(Duration::new(total_seconds, nanos as u32)))
    }

    /// The parsed time as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for LapTime {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl fmt::Display for LapTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_seconds = self.0.as_secs();
        let millis = self.0.subsec_millis();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        if hours > 0 {
            write!(f, "{hours}:{minutes:02}:{seconds:02}.{millis:03}")
        } else if minutes > 0 {
            write!(f, "{minutes}:{seconds:02}.{millis:03}")
        } else {
            write!(f, "{seconds}.{millis:03}")
        }
    }
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
