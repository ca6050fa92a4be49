use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Half-open interval `[start, end)` on a field's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `end` strictly after `start`.
    pub fn is_well_formed(&self) -> bool {
        self.end > self.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Two slots overlap iff `s1 < e2 && s2 < e1`; touching endpoints do not.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whole hours charged for this slot: the duration truncated to hours,
    /// with a floor of one. 1h31m bills as 1, 2h59m as 2.
    pub fn billed_hours(&self) -> i64 {
        match self.duration().num_hours() {
            0 => 1,
            hours => hours,
        }
    }
}

/// Shortest bookable slot.
pub fn minimum_duration() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
    Confirmed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Confirmed => "confirmed",
            Self::Canceled => "canceled",
        }
    }

    /// Active bookings hold their slot.
    pub fn is_active(&self) -> bool {
        *self != Self::Canceled
    }

    /// Paid or any later stage; never moved back by a payment event.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::Confirmed)
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "confirmed" => Ok(Self::Confirmed),
            "canceled" => Ok(Self::Canceled),
            other => Err(anyhow::anyhow!("Unknown booking status '{}'", other)),
        }
    }
}

/// A reservation of one field for one slot by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub field_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn pending(user_id: Uuid, field_id: Uuid, slot: TimeSlot) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            field_id,
            start_time: slot.start,
            end_time: slot.end,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.start_time, self.end_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn overlap_is_half_open() {
        let morning = TimeSlot::new(at(9, 0), at(10, 0));
        assert!(!morning.overlaps(&TimeSlot::new(at(10, 0), at(11, 0))));
        assert!(!morning.overlaps(&TimeSlot::new(at(8, 0), at(9, 0))));
        assert!(morning.overlaps(&TimeSlot::new(at(9, 59), at(11, 0))));
    }

    #[test]
    fn overlap_covers_containment_both_ways() {
        let outer = TimeSlot::new(at(8, 0), at(12, 0));
        let inner = TimeSlot::new(at(9, 0), at(10, 0));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
        assert!(inner.overlaps(&inner));
    }

    #[test]
    fn billed_hours_truncates_with_floor_of_one() {
        assert_eq!(TimeSlot::new(at(9, 0), at(10, 30)).billed_hours(), 1);
        assert_eq!(TimeSlot::new(at(9, 0), at(10, 31)).billed_hours(), 1);
        assert_eq!(TimeSlot::new(at(9, 0), at(9, 10)).billed_hours(), 1);
        assert_eq!(TimeSlot::new(at(9, 0), at(11, 59)).billed_hours(), 2);
        assert_eq!(TimeSlot::new(at(9, 0), at(12, 0)).billed_hours(), 3);
    }

    #[test]
    fn well_formed_requires_positive_length() {
        assert!(TimeSlot::new(at(9, 0), at(10, 0)).is_well_formed());
        assert!(!TimeSlot::new(at(9, 0), at(9, 0)).is_well_formed());
        assert!(!TimeSlot::new(at(10, 0), at(9, 0)).is_well_formed());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Paid,
            BookingStatus::Confirmed,
            BookingStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<BookingStatus>().is_err());
        assert!(!BookingStatus::Canceled.is_active());
    }
}
