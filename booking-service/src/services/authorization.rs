use std::sync::Arc;
use uuid::Uuid;

use crate::models::Booking;
use crate::services::error::BookingError;
use crate::services::repository::Repository;

/// Role and ownership checks in front of booking and payment access.
#[derive(Clone)]
pub struct AuthorizationService {
    repo: Arc<dyn Repository>,
}

impl AuthorizationService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Ok when `user_id` names an admin; unknown users are refused like
    /// any other non-admin.
    pub async fn is_admin_user(&self, user_id: Uuid) -> Result<(), BookingError> {
        match self.repo.get_user(user_id).await? {
            Some(user) if user.is_admin() => Ok(()),
            _ => Err(BookingError::AdminRequired),
        }
    }

    /// Return the booking if `requester_id` is an admin or its owner.
    ///
    /// Non-admins get `Forbidden` both for other users' bookings and for ids
    /// that do not exist.
    pub async fn authorize_booking_access(
        &self,
        requester_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, BookingError> {
        let requester = match self.repo.get_user(requester_id).await? {
            Some(user) => user,
            None => return Err(BookingError::Forbidden),
        };
        let booking = self.repo.get_booking(booking_id).await?;

        match booking {
            Some(booking) if requester.is_admin() || booking.user_id == requester.id => Ok(booking),
            None if requester.is_admin() => Err(BookingError::BookingNotFound(booking_id)),
            _ => {
                tracing::warn!(
                    requester_id = %requester_id,
                    booking_id = %booking_id,
                    "Booking access denied"
                );
                Err(BookingError::Forbidden)
            }
        }
    }
}
