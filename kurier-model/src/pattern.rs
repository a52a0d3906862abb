//! Weekly delivery patterns and their weekday resolution.
//!
//! A customer either picks explicit weekdays or one of the named cadences.
//! Everything downstream (the scheduler in particular) works on the resolved
//! seven-flag form, so resolution lives here next to the types.

use chrono::Weekday;

/// Per-weekday delivery flags, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WeekdayFlags {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl WeekdayFlags {
    /// All seven days selected.
    pub fn all() -> Self {
        Self {
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: true,
            sunday: true,
        }
    }

    /// No days selected.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_set(&self, day: Weekday) -> bool {
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    /// Number of selected days per week.
    pub fn count(&self) -> usize {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// A customer's weekly delivery cadence.
///
/// Named cadences resolve to fixed weekday sets; `Weekly` carries explicit
/// flags. Odd/even alternation is anchored to ISO weekday numbers (Monday
/// is 1), which keeps the set stable across weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeliveryPattern {
    Daily,
    EveryOtherDayEven,
    EveryOtherDayOdd,
    Weekly(WeekdayFlags),
}

impl DeliveryPattern {
    /// Resolve the pattern into per-weekday flags.
    pub fn resolve(&self) -> WeekdayFlags {
        match self {
            DeliveryPattern::Daily => WeekdayFlags::all(),
            DeliveryPattern::EveryOtherDayOdd => WeekdayFlags {
                monday: true,
                wednesday: true,
                friday: true,
                sunday: true,
                ..WeekdayFlags::none()
            },
            DeliveryPattern::EveryOtherDayEven => WeekdayFlags {
                tuesday: true,
                thursday: true,
                saturday: true,
                ..WeekdayFlags::none()
            },
            DeliveryPattern::Weekly(flags) => *flags,
        }
    }
}
