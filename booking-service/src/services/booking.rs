use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{booking::minimum_duration, calculate_amount, Booking, Payment, TimeSlot};
use crate::services::availability::AvailabilityService;
use crate::services::error::BookingError;
use crate::services::metrics::{record_booking_conflict, record_booking_created};
use crate::services::repository::Repository;

/// A newly created booking with the payment record created alongside it.
#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub payment: Payment,
}

#[derive(Clone)]
pub struct BookingService {
    repo: Arc<dyn Repository>,
    availability: AvailabilityService,
}

impl BookingService {
    pub fn new(repo: Arc<dyn Repository>, availability: AvailabilityService) -> Self {
        Self { repo, availability }
    }

    /// Validate and store a pending booking together with its pending payment.
    ///
    /// Checks run in a fixed order: field exists, range is well formed, slot
    /// is free, start is not in the past, duration is at least one hour, the
    /// amount fits in an `i64`.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        field_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CreatedBooking, BookingError> {
        self.create_booking_at(user_id, field_id, start, end, Utc::now())
            .await
    }

    pub(crate) async fn create_booking_at(
        &self,
        user_id: Uuid,
        field_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<CreatedBooking, BookingError> {
        let field = self
            .repo
            .get_field(field_id)
            .await?
            .ok_or(BookingError::FieldNotFound(field_id))?;

        let slot = TimeSlot::new(start, end);
        if !slot.is_well_formed() {
            return Err(BookingError::InvalidTimeRange);
        }

        if self.availability.check_overlap(field_id, start, end).await? {
            record_booking_conflict();
            return Err(BookingError::TimeSlotOverlap);
        }

        if start < now {
            return Err(BookingError::BookingInPast);
        }

        if slot.duration() < minimum_duration() {
            return Err(BookingError::MinimumDuration);
        }

        let amount = calculate_amount(&slot, field.price_per_hour)
            .ok_or(BookingError::AmountTooLarge)?;

        let booking = Booking::pending(user_id, field_id, slot);
        let payment = Payment::pending(booking.id, amount);

        let (booking, payment) = self
            .repo
            .create_booking_with_payment(booking, payment)
            .await
            .map_err(|e| {
                if matches!(e, BookingError::TimeSlotOverlap) {
                    record_booking_conflict();
                }
                e
            })?;

        record_booking_created();
        tracing::info!(
            booking_id = %booking.id,
            field_id = %field_id,
            user_id = %user_id,
            amount = payment.amount,
            "Booking created"
        );

        Ok(CreatedBooking { booking, payment })
    }

    pub async fn get_booking_by_id(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.repo
            .get_booking(id)
            .await?
            .ok_or(BookingError::BookingNotFound(id))
    }

    /// Bookings owned by `user_id`, most recent start first.
    pub async fn get_user_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        self.repo.list_bookings_by_user(user_id).await
    }
}
