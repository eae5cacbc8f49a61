use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slot in the planner's week, which starts on Saturday.
///
/// Saturday=0, Sunday=1, Monday=2, ... Friday=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayIndex(u8);

impl DayIndex {
    pub const SATURDAY: DayIndex = DayIndex(0);

    pub const ALL: [DayIndex; 7] = [
        DayIndex(0),
        DayIndex(1),
        DayIndex(2),
        DayIndex(3),
        DayIndex(4),
        DayIndex(5),
        DayIndex(6),
    ];

    pub fn new(value: u8) -> Option<Self> {
        (value < 7).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        Self(weekday_to_index(weekday.num_days_from_sunday() as u8))
    }

    pub fn for_date(date: NaiveDate) -> Self {
        Self::from_weekday(date.weekday())
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "Saturday",
            1 => "Sunday",
            2 => "Monday",
            3 => "Tuesday",
            4 => "Wednesday",
            5 => "Thursday",
            _ => "Friday",
        }
    }
}

impl TryFrom<u8> for DayIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("day must be within 0..=6, got {value}"))
    }
}

impl From<DayIndex> for u8 {
    fn from(day: DayIndex) -> Self {
        day.0
    }
}

impl fmt::Display for DayIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a native weekday (0=Sunday..6=Saturday) to the Saturday-first index.
pub fn weekday_to_index(native_weekday: u8) -> u8 {
    match native_weekday % 7 {
        0 => 1,
        6 => 0,
        other => other + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn weekday_mapping_matches_saturday_first_week() {
        assert_eq!(weekday_to_index(6), 0);
        assert_eq!(weekday_to_index(0), 1);
        assert_eq!(weekday_to_index(1), 2);
        assert_eq!(weekday_to_index(3), 4);
        assert_eq!(weekday_to_index(5), 6);
    }

    #[test]
    fn weekday_mapping_is_a_bijection() {
        let images = (0u8..7).map(weekday_to_index).collect::<HashSet<_>>();
        assert_eq!(images, (0u8..7).collect::<HashSet<_>>());
    }

    #[test]
    fn chrono_weekdays_follow_the_same_rule() {
        assert_eq!(DayIndex::from_weekday(Weekday::Sat), DayIndex::SATURDAY);
        assert_eq!(DayIndex::from_weekday(Weekday::Sun).value(), 1);
        assert_eq!(DayIndex::from_weekday(Weekday::Fri).value(), 6);

        // 2026-02-14 is a Saturday.
        let saturday = NaiveDate::from_ymd_opt(2026, 2, 14).expect("valid date");
        assert_eq!(DayIndex::for_date(saturday).name(), "Saturday");
        let wednesday = NaiveDate::from_ymd_opt(2026, 2, 18).expect("valid date");
        assert_eq!(DayIndex::for_date(wednesday).name(), "Wednesday");
    }

    #[test]
    fn serde_rejects_out_of_range_days() {
        let parsed: DayIndex = serde_json::from_str("4").expect("valid day");
        assert_eq!(parsed.value(), 4);
        assert!(serde_json::from_str::<DayIndex>("7").is_err());
        assert_eq!(serde_json::to_string(&parsed).expect("serialize day"), "4");
    }

    proptest! {
        #[test]
        fn every_date_maps_into_the_week(days_from_epoch in 0i64..40_000) {
            let date = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch")
                + chrono::Duration::days(days_from_epoch);
            let index = DayIndex::for_date(date);
            prop_assert!(index.value() < 7);
            prop_assert_eq!(
                index.value(),
                weekday_to_index(date.weekday().num_days_from_sunday() as u8)
            );
        }
    }
}
