#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use booking_service::{
    build_router,
    middleware::JwtService,
    models::{Booking, Field, Role, User},
    services::{
        GatewayError, GatewayNotification, HostedTransaction, InMemoryRepository, PaymentGateway,
        Repository, TransactionRequest, TransactionStatus,
    },
    AppState,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use secrecy::Secret;
use service_core::utils::signature::{sha512_hex, signatures_match};
use std::sync::{Arc, Mutex};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_SERVER_KEY: &str = "SB-Mid-server-test";
pub const FIELD_PRICE: i64 = 100_000;

/// How the scripted gateway answers `create_transaction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateBehavior {
    Succeed,
    Reject,
    Timeout,
}

/// Scripted stand-in for the Midtrans client.
pub struct MockGateway {
    create: Mutex<CreateBehavior>,
    status: Mutex<Option<TransactionStatus>>,
    requests: Mutex<Vec<TransactionRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            create: Mutex::new(CreateBehavior::Succeed),
            status: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_create(&self, behavior: CreateBehavior) {
        *self.create.lock().unwrap() = behavior;
    }

    /// Status returned for every order. Without one, lookups are rejected
    /// with 404.
    pub fn set_status(&self, transaction_status: &str, transaction_id: &str) {
        *self.status.lock().unwrap() = Some(TransactionStatus {
            transaction_id: transaction_id.to_string(),
            transaction_status: transaction_status.to_string(),
            payment_type: Some("bank_transfer".to_string()),
            status_code: Some("200".to_string()),
            ..Default::default()
        });
    }

    pub fn clear_status(&self) {
        *self.status.lock().unwrap() = None;
    }

    pub fn requests(&self) -> Vec<TransactionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<HostedTransaction, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let behavior = *self.create.lock().unwrap();
        match behavior {
            CreateBehavior::Succeed => Ok(HostedTransaction {
                token: format!("snap-token-{}", request.order_id),
                redirect_url: format!(
                    "https://app.sandbox.midtrans.com/snap/v2/vtweb/{}",
                    request.order_id
                ),
            }),
            CreateBehavior::Reject => Err(GatewayError::Rejected {
                status: 503,
                message: "service unavailable".to_string(),
            }),
            CreateBehavior::Timeout => Err(GatewayError::Timeout(std::time::Duration::from_secs(15))),
        }
    }

    async fn transaction_status(&self, order_id: &str) -> Result<TransactionStatus, GatewayError> {
        match self.status.lock().unwrap().clone() {
            Some(status) => Ok(TransactionStatus {
                order_id: order_id.to_string(),
                ..status
            }),
            None => Err(GatewayError::Rejected {
                status: 404,
                message: "Transaction doesn't exist.".to_string(),
            }),
        }
    }

    fn verify_notification(&self, notification: &GatewayNotification) -> bool {
        let (Some(order_id), Some(status_code), Some(gross_amount), Some(provided)) = (
            notification.order_id.as_deref(),
            notification.status_code.as_deref(),
            notification.gross_amount.as_deref(),
            notification.signature_key.as_deref(),
        ) else {
            return false;
        };
        let expected = sha512_hex(&[order_id, status_code, gross_amount, TEST_SERVER_KEY]);
        signatures_match(&expected, provided)
    }
}

/// In-process application over the in-memory repository, seeded with an
/// admin, two regular users and one field.
pub struct TestApp {
    pub repo: Arc<InMemoryRepository>,
    pub gateway: Arc<MockGateway>,
    pub jwt: JwtService,
    pub state: AppState,
    pub admin: User,
    pub user: User,
    pub other_user: User,
    pub field: Field,
}

impl TestApp {
    /// Notifications are trusted as posted; signatures are required.
    pub async fn spawn() -> Self {
        Self::spawn_with(false, true).await
    }

    pub async fn spawn_with(verify_notifications: bool, require_signature: bool) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(MockGateway::new());
        let jwt = JwtService::new(&Secret::new(TEST_JWT_SECRET.to_string()));

        let admin = repo
            .create_user(User::new("Admin", "admin@example.com", Role::Admin))
            .await
            .expect("Failed to seed admin");
        let user = repo
            .create_user(User::new("Budi", "budi@example.com", Role::User))
            .await
            .expect("Failed to seed user");
        let other_user = repo
            .create_user(User::new("Sari", "sari@example.com", Role::User))
            .await
            .expect("Failed to seed user");
        let field = repo
            .create_field(Field::new(
                "Lapangan Futsal A".to_string(),
                FIELD_PRICE,
                "Jakarta Selatan".to_string(),
            ))
            .await
            .expect("Failed to seed field");

        let dyn_repo: Arc<dyn Repository> = repo.clone();
        let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();
        let state = AppState::new(
            dyn_repo,
            dyn_gateway,
            jwt.clone(),
            verify_notifications,
            require_signature,
        );

        TestApp {
            repo,
            gateway,
            jwt,
            state,
            admin,
            user,
            other_user,
            field,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn token_for(&self, user: &User) -> String {
        self.jwt
            .issue_token(user.id, &user.email, user.role, Duration::hours(1))
            .expect("Failed to issue token")
    }

    /// Book `hours` hours on the seeded field for `user`, starting tomorrow at
    /// `hour`:00 UTC.
    pub async fn book(&self, user: &User, hour: u32, hours: i64) -> Booking {
        let start = tomorrow_at(hour, 0);
        self.state
            .bookings
            .create_booking(user.id, self.field.id, start, start + Duration::hours(hours))
            .await
            .expect("Failed to create booking")
            .booking
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .expect("valid time of day");
    Utc.from_utc_datetime(&naive)
}

pub fn tomorrow_at(hour: u32, minute: u32) -> DateTime<Utc> {
    at((Utc::now() + Duration::days(1)).date_naive(), hour, minute)
}

pub fn yesterday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    at((Utc::now() - Duration::days(1)).date_naive(), hour, minute)
}

/// Gateway notification signed with the test server key.
pub fn signed_notification(order_id: &str, transaction_status: &str) -> GatewayNotification {
    let status_code = "200";
    let gross_amount = "100000.00";
    GatewayNotification {
        order_id: Some(order_id.to_string()),
        transaction_status: Some(transaction_status.to_string()),
        transaction_id: Some(format!("txn-{}", order_id)),
        payment_type: Some("bank_transfer".to_string()),
        status_code: Some(status_code.to_string()),
        gross_amount: Some(gross_amount.to_string()),
        signature_key: Some(sha512_hex(&[
            order_id,
            status_code,
            gross_amount,
            TEST_SERVER_KEY,
        ])),
        fraud_status: None,
    }
}
