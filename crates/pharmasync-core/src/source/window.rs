//! Time window of a reconciliation run.
//!
//! A run is keyed by a tour date. Inspections created between the day
//! before and the day after it (midnight UTC) belong to the run; both
//! bounds are exclusive, so an inspection created exactly at midnight of
//! the neighbouring day is outside.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Input format of the tour date argument.
pub const TOUR_DATE_FORMAT: &str = "%d.%m.%Y";

/// Timestamp format used in SOQL literals.
pub const SOQL_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One end of a [`QueryWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "lowercase")]
pub enum Bound {
    Inclusive(DateTime<Utc>),
    Exclusive(DateTime<Utc>),
}

impl Bound {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Bound::Inclusive(t) | Bound::Exclusive(t) => *t,
        }
    }

    fn lower_op(&self) -> &'static str {
        match self {
            Bound::Inclusive(_) => ">=",
            Bound::Exclusive(_) => ">",
        }
    }

    fn upper_op(&self) -> &'static str {
        match self {
            Bound::Inclusive(_) => "<=",
            Bound::Exclusive(_) => "<",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub tour_date: NaiveDate,
    pub start: Bound,
    pub end: Bound,
}

impl QueryWindow {
    /// `(tour_date - 1 day, tour_date + 1 day)`, both bounds exclusive.
    pub fn around(tour_date: NaiveDate) -> Self {
        let midnight = tour_date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        Self {
            tour_date,
            start: Bound::Exclusive(midnight - Duration::days(1)),
            end: Bound::Exclusive(midnight + Duration::days(1)),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let after_start = match self.start {
            Bound::Inclusive(s) => ts >= s,
            Bound::Exclusive(s) => ts > s,
        };
        let before_end = match self.end {
            Bound::Inclusive(e) => ts <= e,
            Bound::Exclusive(e) => ts < e,
        };
        after_start && before_end
    }

    /// Render the window as a SOQL predicate on `field`.
    pub fn soql_predicate(&self, field: &str) -> String {
        format!(
            "{field} {} {} AND {field} {} {}",
            self.start.lower_op(),
            self.start.timestamp().format(SOQL_DATETIME_FORMAT),
            self.end.upper_op(),
            self.end.timestamp().format(SOQL_DATETIME_FORMAT),
        )
    }
}

/// Parse a `DD.MM.YYYY` tour date.
pub fn parse_tour_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, TOUR_DATE_FORMAT)
}
