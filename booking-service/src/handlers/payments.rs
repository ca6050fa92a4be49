use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{ApiResponse, PaymentResponse, ProcessPaymentRequest},
    middleware::AuthUser,
    services::{GatewayNotification, NotificationReceipt, PaymentTransaction},
    AppState,
};

/// Manual (offline) settlement.
pub async fn process_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentResponse>>, AppError> {
    req.validate()?;
    state
        .authz
        .authorize_booking_access(user.id, req.booking_id)
        .await?;

    let payment = state
        .payments
        .process_payment(req.booking_id, &req.payment_method)
        .await?;
    Ok(Json(ApiResponse::new(
        "Payment processed successfully",
        payment.into(),
    )))
}

pub async fn get_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentResponse>>, AppError> {
    state
        .authz
        .authorize_booking_access(user.id, booking_id)
        .await?;
    let payment = state.payments.get_payment_by_booking(booking_id).await?;
    Ok(Json(ApiResponse::new(
        "Payment retrieved successfully",
        payment.into(),
    )))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentTransaction>>, AppError> {
    state
        .authz
        .authorize_booking_access(user.id, booking_id)
        .await?;
    let transaction = state
        .payments
        .create_payment_transaction(booking_id)
        .await?;
    Ok(Json(ApiResponse::new(
        "Payment transaction created successfully",
        transaction,
    )))
}

/// Gateway notification webhook. Unauthenticated; trusted through the
/// `signature_key` when signatures are required.
pub async fn notification(
    State(state): State<AppState>,
    Json(payload): Json<GatewayNotification>,
) -> Result<Json<ApiResponse<NotificationReceipt>>, AppError> {
    let has_order_id = payload
        .order_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());

    if state.require_signature && has_order_id && !state.gateway.verify_notification(&payload) {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid notification signature"
        )));
    }

    let receipt = state.payments.handle_payment_notification(&payload).await?;
    Ok(Json(ApiResponse::new(
        "Notification processed successfully",
        receipt,
    )))
}
