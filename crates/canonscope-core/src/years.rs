//! Fixed year range of the reprint matrix and year normalization.
//!
//! The matrix covers the publication years `1840..=2019` plus a sentinel
//! row `0` for editions without a usable year. Row 0 is the sentinel; rows
//! `1..=180` map to the years in ascending order.

use serde::{Deserialize, Serialize};

use crate::error::{CanonError, Result};

/// First year counted as a real publication year.
pub const FIRST_YEAR: i32 = 1840;
/// Last year counted as a real publication year.
pub const LAST_YEAR: i32 = 2019;
/// Placeholder for a missing, unparseable or out-of-range year.
pub const UNKNOWN_YEAR: i32 = 0;
/// Number of matrix rows: the sentinel plus every year in the range.
pub const YEAR_ROWS: usize = (LAST_YEAR - FIRST_YEAR + 1) as usize + 1;

/// Maps a raw extracted year to a matrix key.
///
/// Values inside `[FIRST_YEAR, LAST_YEAR]` are kept; everything else,
/// including a missing year, becomes [`UNKNOWN_YEAR`].
pub fn normalize_year(raw: Option<u64>) -> i32 {
    match raw {
        Some(y) if (FIRST_YEAR as u64..=LAST_YEAR as u64).contains(&y) => y as i32,
        _ => UNKNOWN_YEAR,
    }
}

/// Row index of a matrix key, or `None` when the key is not part of the range.
pub fn row_of(year: i32) -> Option<usize> {
    if year == UNKNOWN_YEAR {
        Some(0)
    } else if (FIRST_YEAR..=LAST_YEAR).contains(&year) {
        Some((year - FIRST_YEAR) as usize + 1)
    } else {
        None
    }
}

/// All matrix keys in row order: `0, 1840, 1841, ..., 2019`.
pub fn year_keys() -> impl Iterator<Item = i32> {
    std::iter::once(UNKNOWN_YEAR).chain(FIRST_YEAR..=LAST_YEAR)
}

/// Inclusive window of real publication years, e.g. the target era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub first: i32,
    pub last: i32,
}

impl YearWindow {
    pub fn new(first: i32, last: i32) -> Result<Self> {
        let invalid = |reason: &str| CanonError::InvalidWindow {
            first,
            last,
            reason: reason.to_string(),
        };
        if first > last {
            return Err(invalid("first year is after last year"));
        }
        if first < FIRST_YEAR || last > LAST_YEAR {
            return Err(invalid(&format!(
                "window must lie within {FIRST_YEAR}-{LAST_YEAR}"
            )));
        }
        Ok(Self { first, last })
    }

    /// Matrix rows covered by this window.
    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        // Both ends are validated in `new`.
        let first = row_of(self.first).unwrap_or(1);
        let last = row_of(self.last).unwrap_or(YEAR_ROWS - 1);
        first..=last
    }
}

impl Default for YearWindow {
    fn default() -> Self {
        Self {
            first: 1970,
            last: 2009,
        }
    }
}
