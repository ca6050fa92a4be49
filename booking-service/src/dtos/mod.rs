use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Booking, BookingStatus, Field, Payment, PaymentStatus, Role, User};
use crate::services::CreatedBooking;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFieldRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(range(
        min = 1,
        max = 1000000000,
        message = "Price per hour must be between 1 and 1000000000"
    ))]
    pub price_per_hour: i64,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub location: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFieldRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(range(
        min = 1,
        max = 1000000000,
        message = "Price per hour must be between 1 and 1000000000"
    ))]
    pub price_per_hour: Option<i64>,

    #[validate(length(max = 255))]
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FieldResponse {
    pub id: Uuid,
    pub name: String,
    pub price_per_hour: i64,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Field> for FieldResponse {
    fn from(field: Field) -> Self {
        Self {
            id: field.id,
            name: field.name,
            price_per_hour: field.price_per_hour,
            location: field.location,
            created_at: field.created_at,
            updated_at: field.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub field_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub field_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            field_id: booking.field_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: booking.status,
            amount: None,
            created_at: booking.created_at,
        }
    }
}

impl From<CreatedBooking> for BookingResponse {
    fn from(created: CreatedBooking) -> Self {
        Self {
            amount: Some(created.payment.amount),
            ..Self::from(created.booking)
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProcessPaymentRequest {
    pub booking_id: Uuid,

    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            booking_id: payment.booking_id,
            amount: payment.amount,
            status: payment.status,
            payment_method: payment.payment_method,
            paid_at: payment.paid_at,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Envelope for successful responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}
