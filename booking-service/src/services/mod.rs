//! Services module for booking-service.

pub mod authorization;
pub mod availability;
pub mod booking;
pub mod error;
pub mod field;
pub mod gateway;
pub mod memory;
pub mod metrics;
pub mod payment;
pub mod postgres;
pub mod repository;
pub mod user;

pub use authorization::AuthorizationService;
pub use availability::AvailabilityService;
pub use booking::{BookingService, CreatedBooking};
pub use error::{BookingError, ErrorKind};
pub use field::FieldService;
pub use gateway::{
    GatewayError, GatewayNotification, HostedTransaction, MidtransClient, PaymentGateway,
    TransactionRequest, TransactionStatus,
};
pub use memory::InMemoryRepository;
pub use metrics::{get_metrics, init_metrics};
pub use payment::{NotificationReceipt, PaymentService, PaymentTransaction};
pub use postgres::PgRepository;
pub use repository::{AppliedNotification, PaymentNotification, Repository};
pub use user::UserService;
