use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Status class of a [`BookingError`], independent of any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    Gateway,
    Internal,
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Field with id '{0}' not found")]
    FieldNotFound(Uuid),

    #[error("Booking with id '{0}' not found")]
    BookingNotFound(Uuid),

    #[error("Payment for booking id '{0}' not found")]
    PaymentNotFound(Uuid),

    #[error("User with id '{0}' not found")]
    UserNotFound(Uuid),

    #[error("End time must be after start time")]
    InvalidTimeRange,

    #[error("Booking cannot be in the past")]
    BookingInPast,

    #[error("Booking duration must be at least 1 hour")]
    MinimumDuration,

    #[error("Invalid payment method")]
    InvalidPaymentMethod,

    #[error("Price per hour must be greater than 0")]
    InvalidPrice,

    #[error("Booking amount exceeds the supported maximum")]
    AmountTooLarge,

    #[error("{0}")]
    Validation(String),

    #[error("Time slot is already booked for this field")]
    TimeSlotOverlap,

    #[error("Payment has already been processed")]
    PaymentAlreadyProcessed,

    #[error("Field with this name already exists")]
    DuplicateFieldName,

    #[error("Booking with id '{0}' has been canceled")]
    BookingCanceled(Uuid),

    #[error("Unauthorized access")]
    Forbidden,

    #[error("Admin access required")]
    AdminRequired,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FieldNotFound(_)
            | Self::BookingNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::InvalidTimeRange
            | Self::BookingInPast
            | Self::MinimumDuration
            | Self::InvalidPaymentMethod
            | Self::InvalidPrice
            | Self::AmountTooLarge
            | Self::Validation(_) => ErrorKind::Validation,
            Self::TimeSlotOverlap
            | Self::PaymentAlreadyProcessed
            | Self::DuplicateFieldName
            | Self::BookingCanceled(_) => ErrorKind::Conflict,
            Self::Forbidden | Self::AdminRequired => ErrorKind::Forbidden,
            Self::Gateway(_) => ErrorKind::Gateway,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        BookingError::Internal(anyhow::Error::new(err))
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => AppError::NotFound(anyhow::anyhow!(message)),
            ErrorKind::Validation => AppError::BadRequest(anyhow::anyhow!(message)),
            ErrorKind::Conflict => AppError::Conflict(anyhow::anyhow!(message)),
            ErrorKind::Forbidden => AppError::Forbidden(anyhow::anyhow!(message)),
            ErrorKind::Gateway => AppError::BadGateway(message),
            ErrorKind::Internal => match err {
                BookingError::Internal(inner) => AppError::InternalError(inner),
                _ => AppError::InternalError(anyhow::anyhow!(message)),
            },
        }
    }
}
