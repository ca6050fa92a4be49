use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    resolve_notification, Booking, BookingStatus, Field, Payment, PaymentStatus, TimeSlot, User,
};
use crate::services::error::BookingError;
use crate::services::repository::{
    ensure_completable, AppliedNotification, PaymentNotification, RepoResult, Repository,
};

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    fields: HashMap<Uuid, Field>,
    bookings: HashMap<Uuid, Booking>,
    /// Keyed by booking id; one payment per booking.
    payments: HashMap<Uuid, Payment>,
}

impl Store {
    fn overlaps(&self, field_id: Uuid, slot: &TimeSlot) -> bool {
        self.bookings.values().any(|b| {
            b.field_id == field_id && b.status.is_active() && b.slot().overlaps(slot)
        })
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.fields
            .values()
            .any(|f| f.name == name && Some(f.id) != except)
    }

    fn pair_mut(&mut self, booking_id: Uuid) -> RepoResult<(&mut Payment, &mut Booking)> {
        let booking = self
            .bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        let payment = self
            .payments
            .get_mut(&booking_id)
            .ok_or(BookingError::PaymentNotFound(booking_id))?;
        Ok((payment, booking))
    }
}

/// Process-local repository. A single lock serialises every operation, which
/// makes each compound operation atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut store = self.store.lock().await;
        if store.users.values().any(|u| u.email == user.email) {
            return Err(BookingError::Validation(format!(
                "User with email '{}' already exists",
                user.email
            )));
        }
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store.lock().await.users.get(&id).cloned())
    }

    async fn create_field(&self, field: Field) -> RepoResult<Field> {
        let mut store = self.store.lock().await;
        if store.name_taken(&field.name, None) {
            return Err(BookingError::DuplicateFieldName);
        }
        store.fields.insert(field.id, field.clone());
        Ok(field)
    }

    async fn get_field(&self, id: Uuid) -> RepoResult<Option<Field>> {
        Ok(self.store.lock().await.fields.get(&id).cloned())
    }

    async fn list_fields(&self) -> RepoResult<Vec<Field>> {
        let store = self.store.lock().await;
        let mut fields: Vec<Field> = store.fields.values().cloned().collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fields)
    }

    async fn update_field(&self, field: Field) -> RepoResult<Field> {
        let mut store = self.store.lock().await;
        if !store.fields.contains_key(&field.id) {
            return Err(BookingError::FieldNotFound(field.id));
        }
        if store.name_taken(&field.name, Some(field.id)) {
            return Err(BookingError::DuplicateFieldName);
        }
        store.fields.insert(field.id, field.clone());
        Ok(field)
    }

    async fn delete_field(&self, id: Uuid) -> RepoResult<()> {
        let mut store = self.store.lock().await;
        if store.bookings.values().any(|b| b.field_id == id) {
            return Err(BookingError::Validation(
                "Field has bookings and cannot be deleted".to_string(),
            ));
        }
        store
            .fields
            .remove(&id)
            .map(|_| ())
            .ok_or(BookingError::FieldNotFound(id))
    }

    async fn has_overlap(&self, field_id: Uuid, slot: TimeSlot) -> RepoResult<bool> {
        Ok(self.store.lock().await.overlaps(field_id, &slot))
    }

    async fn create_booking_with_payment(
        &self,
        booking: Booking,
        payment: Payment,
    ) -> RepoResult<(Booking, Payment)> {
        let mut store = self.store.lock().await;
        if !store.fields.contains_key(&booking.field_id) {
            return Err(BookingError::FieldNotFound(booking.field_id));
        }
        if store.overlaps(booking.field_id, &booking.slot()) {
            return Err(BookingError::TimeSlotOverlap);
        }
        store.bookings.insert(booking.id, booking.clone());
        store.payments.insert(booking.id, payment.clone());
        Ok((booking, payment))
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        Ok(self.store.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        let store = self.store.lock().await;
        let mut bookings: Vec<Booking> = store
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(bookings)
    }

    async fn get_payment_by_booking(&self, booking_id: Uuid) -> RepoResult<Option<Payment>> {
        Ok(self.store.lock().await.payments.get(&booking_id).cloned())
    }

    async fn complete_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
        paid_at: DateTime<Utc>,
    ) -> RepoResult<(Payment, Booking)> {
        let mut store = self.store.lock().await;
        let (payment, booking) = store.pair_mut(booking_id)?;
        ensure_completable(payment, booking)?;

        payment.status = PaymentStatus::Success;
        payment.paid_at = Some(paid_at);
        payment.payment_method = Some(payment_method.to_string());
        payment.updated_at = paid_at;
        if booking.status == BookingStatus::Pending {
            booking.status = BookingStatus::Paid;
            booking.updated_at = paid_at;
        }
        Ok((payment.clone(), booking.clone()))
    }

    async fn prepare_payment_attempt(
        &self,
        booking_id: Uuid,
        amount: i64,
        order_id: &str,
    ) -> RepoResult<Payment> {
        let mut store = self.store.lock().await;
        let payment = store
            .payments
            .get_mut(&booking_id)
            .ok_or(BookingError::PaymentNotFound(booking_id))?;
        if payment.status == PaymentStatus::Success {
            return Err(BookingError::PaymentAlreadyProcessed);
        }
        payment.amount = amount;
        payment.status = PaymentStatus::Pending;
        payment.gateway_order_id = Some(order_id.to_string());
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn fail_payment_attempt(&self, booking_id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.lock().await;
        match store.payments.get_mut(&booking_id) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = PaymentStatus::Failed;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(BookingError::PaymentNotFound(booking_id)),
        }
    }

    async fn apply_payment_notification(
        &self,
        notification: PaymentNotification,
    ) -> RepoResult<AppliedNotification> {
        let mut store = self.store.lock().await;
        let (payment, booking) = store.pair_mut(notification.booking_id)?;

        let transition = resolve_notification(
            payment,
            booking.status,
            notification.status,
            notification.payment_method.as_deref(),
        );

        let at = notification.received_at;
        if let Some(status) = transition.payment_status {
            payment.status = status;
            payment.updated_at = at;
        }
        if transition.set_paid_at {
            payment.paid_at = Some(at);
        }
        if let Some(method) = &transition.payment_method {
            payment.payment_method = Some(method.clone());
            payment.updated_at = at;
        }
        if let Some(status) = transition.booking_status {
            booking.status = status;
            booking.updated_at = at;
        }

        Ok(AppliedNotification {
            transition,
            payment: payment.clone(),
            booking: booking.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationOutcome;
    use chrono::Duration;

    async fn seeded() -> (InMemoryRepository, Field) {
        let repo = InMemoryRepository::new();
        let field = repo
            .create_field(Field::new("Lapangan A".into(), 100_000, "Jakarta".into()))
            .await
            .unwrap();
        (repo, field)
    }

    fn slot(offset_hours: i64, hours: i64) -> TimeSlot {
        let start = Utc::now() + Duration::days(1) + Duration::hours(offset_hours);
        TimeSlot::new(start, start + Duration::hours(hours))
    }

    async fn book(repo: &InMemoryRepository, field: &Field, slot: TimeSlot) -> RepoResult<Booking> {
        let booking = Booking::pending(Uuid::new_v4(), field.id, slot);
        let payment = Payment::pending(booking.id, 100_000);
        repo.create_booking_with_payment(booking, payment)
            .await
            .map(|(b, _)| b)
    }

    #[tokio::test]
    async fn second_overlapping_insert_is_rejected() {
        let (repo, field) = seeded().await;
        book(&repo, &field, slot(0, 2)).await.unwrap();
        let err = book(&repo, &field, slot(1, 2)).await.unwrap_err();
        assert!(matches!(err, BookingError::TimeSlotOverlap));
        // Adjacent slot is fine.
        book(&repo, &field, slot(2, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_field_name_is_rejected() {
        let (repo, _) = seeded().await;
        let err = repo
            .create_field(Field::new("Lapangan A".into(), 50_000, "Bandung".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DuplicateFieldName));
    }

    #[tokio::test]
    async fn complete_payment_is_not_repeatable() {
        let (repo, field) = seeded().await;
        let booking = book(&repo, &field, slot(0, 1)).await.unwrap();

        let (payment, booking_after) = repo
            .complete_payment(booking.id, "cash", Utc::now())
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert!(payment.paid_at.is_some());
        assert_eq!(booking_after.status, BookingStatus::Paid);

        let err = repo
            .complete_payment(booking.id, "cash", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::PaymentAlreadyProcessed));
    }

    #[tokio::test]
    async fn fail_attempt_only_moves_pending() {
        let (repo, field) = seeded().await;
        let booking = book(&repo, &field, slot(0, 1)).await.unwrap();
        assert!(repo.fail_payment_attempt(booking.id).await.unwrap());
        assert!(!repo.fail_payment_attempt(booking.id).await.unwrap());
    }

    #[tokio::test]
    async fn notification_after_success_is_stale() {
        let (repo, field) = seeded().await;
        let booking = book(&repo, &field, slot(0, 1)).await.unwrap();
        let notify = |status| PaymentNotification {
            booking_id: booking.id,
            status,
            payment_method: Some("gopay".into()),
            received_at: Utc::now(),
        };

        let applied = repo
            .apply_payment_notification(notify(PaymentStatus::Success))
            .await
            .unwrap();
        assert_eq!(applied.transition.outcome, NotificationOutcome::Applied);
        assert_eq!(applied.booking.status, BookingStatus::Paid);

        let stale = repo
            .apply_payment_notification(notify(PaymentStatus::Failed))
            .await
            .unwrap();
        assert_eq!(stale.transition.outcome, NotificationOutcome::Stale);
        assert_eq!(stale.payment.status, PaymentStatus::Success);
        assert_eq!(stale.booking.status, BookingStatus::Paid);
    }
}
