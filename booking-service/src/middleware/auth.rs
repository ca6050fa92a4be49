use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Role, User};
use crate::AppState;

/// Bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// HS256 token validation (and issuance, for operators and tests).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &Secret<String>) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
        }
    }

    pub fn issue_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            name: None,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, anyhow::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow::anyhow!("Invalid token: {}", e))
    }
}

/// Require a valid bearer token and attach the caller's [`User`] to the
/// request. First-time callers are provisioned from their claims.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.jwt.validate_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Token rejected");
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid token subject")))?;
    let role = claims
        .role
        .parse::<Role>()
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid token role")))?;

    let user = state
        .users
        .provision(
            user_id,
            claims.name.as_deref().unwrap_or_default(),
            &claims.email,
            role,
        )
        .await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// The authenticated caller, as stored.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }
}
