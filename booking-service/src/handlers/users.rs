use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{ApiResponse, UserResponse},
    middleware::AuthUser,
    services::BookingError,
    AppState,
};

pub async fn get_profile(AuthUser(user): AuthUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::new("Profile retrieved successfully", user.into()))
}

/// Self or admin only.
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    if requester.id != id && !requester.is_admin() {
        return Err(BookingError::Forbidden.into());
    }
    let user = state.users.get_user(id).await?;
    Ok(Json(ApiResponse::new("User retrieved successfully", user.into())))
}
