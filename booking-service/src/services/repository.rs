//! Persistence boundary for booking-service.
//!
//! Plain CRUD plus the compound operations that must be atomic: booking
//! creation with its payment, and every payment transition that also touches
//! the booking. Implementations: [`PgRepository`](super::postgres::PgRepository)
//! and [`InMemoryRepository`](super::memory::InMemoryRepository).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, Field, NotificationTransition, Payment, PaymentStatus, TimeSlot, User,
};
use crate::services::error::BookingError;

pub type RepoResult<T> = Result<T, BookingError>;

/// Gateway status to apply to a booking's payment.
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub booking_id: Uuid,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Result of [`Repository::apply_payment_notification`].
#[derive(Debug, Clone)]
pub struct AppliedNotification {
    pub transition: NotificationTransition,
    pub payment: Payment,
    pub booking: Booking,
}

#[async_trait]
pub trait Repository: Send + Sync {
    // Users

    async fn create_user(&self, user: User) -> RepoResult<User>;

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    // Fields

    /// Fails with `DuplicateFieldName` when the name is taken.
    async fn create_field(&self, field: Field) -> RepoResult<Field>;

    async fn get_field(&self, id: Uuid) -> RepoResult<Option<Field>>;

    async fn list_fields(&self) -> RepoResult<Vec<Field>>;

    /// Fails with `FieldNotFound` or `DuplicateFieldName`.
    async fn update_field(&self, field: Field) -> RepoResult<Field>;

    async fn delete_field(&self, id: Uuid) -> RepoResult<()>;

    // Bookings

    /// Whether an active booking on `field_id` overlaps `slot`.
    async fn has_overlap(&self, field_id: Uuid, slot: TimeSlot) -> RepoResult<bool>;

    /// Insert a booking and its pending payment as one unit.
    ///
    /// The overlap check is repeated under a per-field lock (or storage
    /// constraint), so of two racing inserts for intersecting slots exactly one
    /// commits; the other fails with `TimeSlotOverlap`.
    async fn create_booking_with_payment(
        &self,
        booking: Booking,
        payment: Payment,
    ) -> RepoResult<(Booking, Payment)>;

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn list_bookings_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>>;

    // Payments

    async fn get_payment_by_booking(&self, booking_id: Uuid) -> RepoResult<Option<Payment>>;

    /// Manual settlement: payment → success (with `paid_at` and method) and
    /// booking → paid, atomically. Fails with `PaymentAlreadyProcessed` if the
    /// payment is already successful, `BookingCanceled` for canceled bookings.
    async fn complete_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
        paid_at: DateTime<Utc>,
    ) -> RepoResult<(Payment, Booking)>;

    /// Reset the payment for a new gateway attempt: refresh the amount, mark it
    /// pending and record the order id. Fails with `PaymentAlreadyProcessed`
    /// when the payment is already successful.
    async fn prepare_payment_attempt(
        &self,
        booking_id: Uuid,
        amount: i64,
        order_id: &str,
    ) -> RepoResult<Payment>;

    /// Mark a pending payment as failed. Returns `false` when the payment was
    /// no longer pending (e.g. a success landed concurrently).
    async fn fail_payment_attempt(&self, booking_id: Uuid) -> RepoResult<bool>;

    /// Resolve and apply a gateway notification as one unit.
    async fn apply_payment_notification(
        &self,
        notification: PaymentNotification,
    ) -> RepoResult<AppliedNotification>;
}

/// Shared precondition for manual settlement.
pub(crate) fn ensure_completable(payment: &Payment, booking: &Booking) -> RepoResult<()> {
    if payment.status == PaymentStatus::Success {
        return Err(BookingError::PaymentAlreadyProcessed);
    }
    if booking.status == BookingStatus::Canceled {
        return Err(BookingError::BookingCanceled(booking.id));
    }
    Ok(())
}
