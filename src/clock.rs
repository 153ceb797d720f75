//! Match clock read-out.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ClockError;

/// Minutes on the clock when a match begins.
pub const MATCH_MINUTES: u32 = 10;

/// Remaining match time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Clock {
    pub minutes: u32,
    pub seconds: u32,
}

impl Clock {
    pub fn new(minutes: u32, seconds: u32) -> Result<Self, ClockError> {
        if minutes > MATCH_MINUTES || seconds > 59 || (minutes == MATCH_MINUTES && seconds > 0) {
            return Err(ClockError::OutOfRange { minutes, seconds });
        }
        Ok(Self { minutes, seconds })
    }

    pub fn start() -> Self {
        Self {
            minutes: MATCH_MINUTES,
            seconds: 0,
        }
    }

    /// Build from four read-out digits `[m, m, s, s]`.
    pub fn from_digits(digits: [i64; 4]) -> Result<Self, ClockError> {
        let kitchen: String = digits.iter().map(|d| d.to_string()).collect();
        if digits.iter().any(|d| !(0..=9).contains(d)) {
            return Err(ClockError::Unreadable(kitchen));
        }
        format!("{}{}:{}{}", digits[0], digits[1], digits[2], digits[3]).parse()
    }

    pub fn total_seconds(&self) -> u32 {
        self.minutes * 60 + self.seconds
    }

    pub fn is_start(&self) -> bool {
        *self == Self::start()
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }

    /// Deposits count double once this few seconds remain. A zero clock is
    /// treated as unknown.
    pub fn is_final_stretch(&self, threshold_secs: u32) -> bool {
        let seconds = self.total_seconds();
        seconds != 0 && seconds <= threshold_secs
    }
}

impl FromStr for Clock {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unreadable = || ClockError::Unreadable(s.to_string());
        let captures = Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*$")
            .map_err(|_| unreadable())?
            .captures(s)
            .ok_or_else(unreadable)?;

        let number = |i: usize| {
            captures
                .get(i)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .ok_or_else(unreadable)
        };

        Clock::new(number(1)?, number(2)?)
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}
