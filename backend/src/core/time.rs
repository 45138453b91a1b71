//! Time management for the engine
//!
//! The engine advances through discrete processing ticks. Each tick carries a
//! wall-clock timestamp (unix seconds) supplied by the tick driver. This module
//! tracks the tick height and enforces that timestamps never move backwards,
//! which the due queues rely on: an entry due at `t` is visited no later than
//! the first tick whose timestamp is `>= t`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Seconds in a (non-leap) year, used to convert elapsed time into years.
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// Errors raised when advancing the tick clock
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Tick timestamp cannot be negative: {0}")]
    NegativeTimestamp(i64),

    #[error("Tick timestamp moved backwards: current {current}, requested {requested}")]
    NonMonotonic { current: i64, requested: i64 },
}

/// Tracks tick height and the timestamp of the current tick
///
/// # Example
/// ```
/// use vault_engine_core_rs::TimeManager;
///
/// let mut time = TimeManager::new();
/// assert_eq!(time.current_height(), 0);
///
/// time.advance_to(1_700_000_000).unwrap();
/// assert_eq!(time.current_height(), 1);
/// assert_eq!(time.current_time(), 1_700_000_000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeManager {
    /// Number of ticks processed so far
    current_height: u64,
    /// Timestamp (unix seconds) of the most recent tick
    current_time: i64,
}

impl TimeManager {
    /// Create a clock at height 0, time 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a clock from persisted values
    pub fn from_parts(current_height: u64, current_time: i64) -> Self {
        Self {
            current_height,
            current_time,
        }
    }

    /// Advance to the next tick at timestamp `now`
    ///
    /// Equal timestamps are accepted (several ticks may share a second);
    /// a timestamp earlier than the current one is rejected.
    ///
    /// # Example
    /// ```
    /// use vault_engine_core_rs::TimeManager;
    ///
    /// let mut time = TimeManager::new();
    /// time.advance_to(100).unwrap();
    /// assert!(time.advance_to(99).is_err());
    /// assert_eq!(time.current_time(), 100);
    /// ```
    pub fn advance_to(&mut self, now: i64) -> Result<(), TimeError> {
        if now < 0 {
            return Err(TimeError::NegativeTimestamp(now));
        }
        if now < self.current_time {
            return Err(TimeError::NonMonotonic {
                current: self.current_time,
                requested: now,
            });
        }
        self.current_time = now;
        self.current_height += 1;
        Ok(())
    }

    /// Number of ticks processed
    pub fn current_height(&self) -> u64 {
        self.current_height
    }

    /// Timestamp of the most recent tick
    pub fn current_time(&self) -> i64 {
        self.current_time
    }
}
