use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{ApiResponse, CreateFieldRequest, FieldResponse, UpdateFieldRequest},
    middleware::AuthUser,
    AppState,
};

pub async fn list_fields(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<FieldResponse>>>, AppError> {
    let fields = state.fields.list_fields().await?;
    Ok(Json(ApiResponse::new(
        "Fields retrieved successfully",
        fields.into_iter().map(FieldResponse::from).collect(),
    )))
}

pub async fn get_field(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FieldResponse>>, AppError> {
    let field = state.fields.get_field(id).await?;
    Ok(Json(ApiResponse::new(
        "Field retrieved successfully",
        field.into(),
    )))
}

pub async fn create_field(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateFieldRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FieldResponse>>), AppError> {
    state.authz.is_admin_user(user.id).await?;
    req.validate()?;

    let field = state
        .fields
        .create_field(req.name, req.price_per_hour, req.location)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Field created successfully", field.into())),
    ))
}

pub async fn update_field(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateFieldRequest>,
) -> Result<Json<ApiResponse<FieldResponse>>, AppError> {
    state.authz.is_admin_user(user.id).await?;
    req.validate()?;

    let field = state
        .fields
        .update_field(id, req.name, req.price_per_hour, req.location)
        .await?;
    Ok(Json(ApiResponse::new(
        "Field updated successfully",
        field.into(),
    )))
}

pub async fn delete_field(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.authz.is_admin_user(user.id).await?;
    state.fields.delete_field(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
