use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Role, User};
use crate::services::error::BookingError;
use crate::services::repository::Repository;

/// User records referenced by bookings. Credentials and token issuance live
/// with the identity provider; this service only keeps the profile.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn Repository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, BookingError> {
        self.repo
            .get_user(id)
            .await?
            .ok_or(BookingError::UserNotFound(id))
    }

    /// Return the stored user for a verified identity, creating it on first
    /// sight. An existing record is never overwritten.
    pub async fn provision(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        role: Role,
    ) -> Result<User, BookingError> {
        if let Some(user) = self.repo.get_user(id).await? {
            return Ok(user);
        }

        let display_name = if name.trim().is_empty() { email } else { name };
        let user = User {
            id,
            ..User::new(display_name, email, role)
        };
        match self.repo.create_user(user).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = user.role.as_str(), "User provisioned");
                Ok(user)
            }
            // Lost a race with a concurrent first request.
            Err(err) => match self.repo.get_user(id).await? {
                Some(user) => Ok(user),
                None => Err(err),
            },
        }
    }
}
