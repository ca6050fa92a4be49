use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{ApiResponse, BookingResponse, CreateBookingRequest},
    middleware::AuthUser,
    AppState,
};

pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>), AppError> {
    let created = state
        .bookings
        .create_booking(user.id, req.field_id, req.start_time, req.end_time)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Booking created successfully", created.into())),
    ))
}

pub async fn get_user_bookings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, AppError> {
    let bookings = state.bookings.get_user_bookings(user.id).await?;
    Ok(Json(ApiResponse::new(
        "Bookings retrieved successfully",
        bookings.into_iter().map(BookingResponse::from).collect(),
    )))
}

pub async fn get_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, AppError> {
    let booking = state.authz.authorize_booking_access(user.id, id).await?;
    Ok(Json(ApiResponse::new(
        "Booking retrieved successfully",
        booking.into(),
    )))
}
