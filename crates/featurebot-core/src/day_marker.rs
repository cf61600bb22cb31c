//! Day marker: the weekday on which the countdown was last decremented.

use chrono::{DateTime, Datelike, TimeZone};

use crate::countdown::CountdownStore;
use crate::error::StoreError;

/// Value reported before any decrement pass has run.
pub const INITIAL_DAY: u8 = 0;

/// Durable single-value store for the last processed weekday (0 = Sunday).
pub trait DayMarker: Send + Sync {
    /// Last recorded weekday index, or [`INITIAL_DAY`] if never set.
    fn get(&self) -> Result<u8, StoreError>;

    /// Overwrite the marker without touching any countdown.
    fn set(&self, day: u8) -> Result<(), StoreError>;
}

/// Countdowns and marker kept in one database, so a day can be claimed and
/// its decrement applied in a single step.
pub trait RolloverStore: CountdownStore + DayMarker {
    /// Unless the marker already reads `day`, decrement every record and set
    /// the marker to `day` in one transaction.
    ///
    /// Returns the number of records touched, or `None` when `day` was
    /// already processed, possibly through another handle on the same file.
    fn advance_day(&self, day: u8) -> Result<Option<usize>, StoreError>;
}

/// Weekday index of `at` in its own timezone, Sunday = 0 through Saturday = 6.
pub fn weekday_index<Tz: TimeZone>(at: &DateTime<Tz>) -> u8 {
    at.weekday().num_days_from_sunday() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn weekday_index_counts_from_sunday() {
        let sunday = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2026, 10, 24, 12, 0, 0).unwrap();
        assert_eq!(weekday_index(&sunday), 0);
        assert_eq!(weekday_index(&saturday), 6);
    }
}
