//! Application wiring and HTTP server lifecycle.

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{BookingConfig, StorageBackend};
use crate::handlers;
use crate::middleware::{auth_middleware, JwtService};
use crate::services::{
    init_metrics, AuthorizationService, AvailabilityService, BookingService, FieldService,
    InMemoryRepository, MidtransClient, PaymentGateway, PaymentService, PgRepository, Repository,
    UserService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtService,
    pub users: UserService,
    pub fields: FieldService,
    pub bookings: BookingService,
    pub payments: PaymentService,
    pub authz: AuthorizationService,
    pub gateway: Arc<dyn PaymentGateway>,
    /// Reject gateway notifications without a valid `signature_key`.
    pub require_signature: bool,
    /// Probed by `/ready` when running on PostgreSQL.
    pub database: Option<PgRepository>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn PaymentGateway>,
        jwt: JwtService,
        verify_notifications: bool,
        require_signature: bool,
    ) -> Self {
        let availability = AvailabilityService::new(repo.clone());
        Self {
            jwt,
            users: UserService::new(repo.clone()),
            fields: FieldService::new(repo.clone()),
            bookings: BookingService::new(repo.clone(), availability),
            payments: PaymentService::new(repo.clone(), gateway.clone(), verify_notifications),
            authz: AuthorizationService::new(repo),
            gateway,
            require_signature,
            database: None,
        }
    }

    pub fn with_database(mut self, database: PgRepository) -> Self {
        self.database = Some(database);
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/users/profile", get(handlers::users::get_profile))
        .route("/api/users/:id", get(handlers::users::get_user))
        .route("/api/fields", post(handlers::fields::create_field))
        .route(
            "/api/fields/:id",
            put(handlers::fields::update_field).delete(handlers::fields::delete_field),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/user", get(handlers::bookings::get_user_bookings))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route("/api/payments", post(handlers::payments::process_payment))
        .route("/api/payments/:booking_id", get(handlers::payments::get_payment))
        .route(
            "/api/payments/:booking_id/transaction",
            post(handlers::payments::create_transaction),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/api/fields", get(handlers::fields::list_fields))
        .route("/api/fields/:id", get(handlers::fields::get_field))
        .route(
            "/api/payments/notification",
            post(handlers::payments::notification),
        );

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Connect storage, wire services and bind the listener. Port 0 binds a
    /// random free port.
    pub async fn build(config: BookingConfig, port: u16) -> Result<Self, AppError> {
        init_metrics();

        let (repo, database): (Arc<dyn Repository>, Option<PgRepository>) = match config.storage {
            StorageBackend::Postgres => {
                let url = config.database.url.as_ref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?;
                let db = PgRepository::connect(
                    url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await?;
                db.run_migrations().await?;
                let repo: Arc<dyn Repository> = Arc::new(db.clone());
                (repo, Some(db))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
                (repo, None)
            }
        };

        let gateway = MidtransClient::new(config.gateway.clone()).map_err(|e| {
            tracing::error!(error = %e, "Failed to build gateway client");
            AppError::ConfigError(anyhow::anyhow!("Gateway client error: {}", e))
        })?;
        tracing::info!(
            environment = ?config.gateway.environment,
            verify_notifications = config.gateway.verify_notifications,
            require_signature = config.gateway.require_signature,
            "Midtrans client initialized"
        );

        let mut state = AppState::new(
            repo,
            Arc::new(gateway),
            JwtService::new(&config.jwt_secret),
            config.gateway.verify_notifications,
            config.gateway.require_signature,
        );
        if let Some(db) = database {
            state = state.with_database(db);
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Booking service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}
