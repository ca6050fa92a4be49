//! Domain models for booking-service.

pub mod booking;
pub mod field;
pub mod payment;
pub mod user;

pub use booking::{Booking, BookingStatus, TimeSlot};
pub use field::{Field, MAX_PRICE_PER_HOUR};
pub use payment::{
    calculate_amount, map_gateway_status, resolve_notification, NotificationOutcome,
    NotificationTransition, Payment, PaymentStatus,
};
pub use user::{Role, User};
