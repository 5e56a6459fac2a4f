use std::fmt::Display;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanInterval {
    Day,
    Week,
    Month,
    Year,
}

impl Display for PlanInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let interval = match self {
            PlanInterval::Day => "day",
            PlanInterval::Week => "week",
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
        };
        write!(f, "{}", interval)
    }
}

impl PlanInterval {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "day" => Some(PlanInterval::Day),
            "week" => Some(PlanInterval::Week),
            "month" => Some(PlanInterval::Month),
            "year" => Some(PlanInterval::Year),
            _ => None,
        }
    }

    /// Slug used for recurring prices that carry no explicit `plan_slug` metadata.
    pub fn default_slug(&self) -> Option<&'static str> {
        match self {
            PlanInterval::Week => Some("weekly"),
            PlanInterval::Month => Some("monthly"),
            PlanInterval::Year => Some("yearly"),
            PlanInterval::Day => None,
        }
    }

    /// `anchor + interval * count`. Month and year steps clamp to the last day of
    /// the target month (Jan 31 + 1 month = Feb 28/29).
    pub fn advance(&self, anchor: DateTime<Utc>, count: u32) -> Option<DateTime<Utc>> {
        match self {
            PlanInterval::Day => anchor.checked_add_signed(Duration::days(count.into())),
            PlanInterval::Week => anchor.checked_add_signed(Duration::weeks(count.into())),
            PlanInterval::Month => anchor.checked_add_months(Months::new(count)),
            PlanInterval::Year => anchor.checked_add_months(Months::new(count.checked_mul(12)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn advances_by_interval_count() {
        let anchor = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();

        assert_eq!(
            PlanInterval::Day.advance(anchor, 3),
            Some(Utc.with_ymd_and_hms(2025, 1, 13, 12, 0, 0).unwrap())
        );
        assert_eq!(
            PlanInterval::Week.advance(anchor, 2),
            Some(Utc.with_ymd_and_hms(2025, 1, 24, 12, 0, 0).unwrap())
        );
        assert_eq!(
            PlanInterval::Month.advance(anchor, 1),
            Some(Utc.with_ymd_and_hms(2025, 2, 10, 12, 0, 0).unwrap())
        );
        assert_eq!(
            PlanInterval::Year.advance(anchor, 1),
            Some(Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn month_end_anchor_is_clamped() {
        let anchor = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(
            PlanInterval::Month.advance(anchor, 1),
            Some(Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn default_slugs_follow_interval() {
        assert_eq!(PlanInterval::Week.default_slug(), Some("weekly"));
        assert_eq!(PlanInterval::Month.default_slug(), Some("monthly"));
        assert_eq!(PlanInterval::Year.default_slug(), Some("yearly"));
        assert_eq!(PlanInterval::Day.default_slug(), None);
    }
}
