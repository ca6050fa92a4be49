use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Field, MAX_PRICE_PER_HOUR};
use crate::services::error::BookingError;
use crate::services::repository::Repository;

/// Field management. Mutations are admin-only; the caller checks that.
#[derive(Clone)]
pub struct FieldService {
    repo: Arc<dyn Repository>,
}

fn validate(name: &str, price_per_hour: i64) -> Result<(), BookingError> {
    if name.trim().is_empty() {
        return Err(BookingError::Validation("Field name is required".to_string()));
    }
    if price_per_hour <= 0 {
        return Err(BookingError::InvalidPrice);
    }
    if price_per_hour > MAX_PRICE_PER_HOUR {
        return Err(BookingError::Validation(format!(
            "Price per hour must not exceed {}",
            MAX_PRICE_PER_HOUR
        )));
    }
    Ok(())
}

impl FieldService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn create_field(
        &self,
        name: String,
        price_per_hour: i64,
        location: String,
    ) -> Result<Field, BookingError> {
        validate(&name, price_per_hour)?;
        let field = self
            .repo
            .create_field(Field::new(name.trim().to_string(), price_per_hour, location))
            .await?;
        tracing::info!(field_id = %field.id, name = %field.name, "Field created");
        Ok(field)
    }

    pub async fn list_fields(&self) -> Result<Vec<Field>, BookingError> {
        self.repo.list_fields().await
    }

    pub async fn get_field(&self, id: Uuid) -> Result<Field, BookingError> {
        self.repo
            .get_field(id)
            .await?
            .ok_or(BookingError::FieldNotFound(id))
    }

    /// Replace the provided attributes; `None` keeps the stored value.
    pub async fn update_field(
        &self,
        id: Uuid,
        name: Option<String>,
        price_per_hour: Option<i64>,
        location: Option<String>,
    ) -> Result<Field, BookingError> {
        let mut field = self.get_field(id).await?;
        if let Some(name) = name {
            field.name = name.trim().to_string();
        }
        if let Some(price) = price_per_hour {
            field.price_per_hour = price;
        }
        if let Some(location) = location {
            field.location = location;
        }
        validate(&field.name, field.price_per_hour)?;
        field.updated_at = Utc::now();

        self.repo.update_field(field).await
    }

    pub async fn delete_field(&self, id: Uuid) -> Result<(), BookingError> {
        self.repo.delete_field(id).await?;
        tracing::info!(field_id = %id, "Field deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_name_and_non_positive_price() {
        assert!(matches!(validate("  ", 10), Err(BookingError::Validation(_))));
        assert!(matches!(validate("A", 0), Err(BookingError::InvalidPrice)));
        assert!(matches!(validate("A", -5), Err(BookingError::InvalidPrice)));
        assert!(validate("A", 1).is_ok());
    }

    #[test]
    fn rejects_price_above_maximum() {
        assert!(validate("A", MAX_PRICE_PER_HOUR).is_ok());
        assert!(matches!(
            validate("A", MAX_PRICE_PER_HOUR + 1),
            Err(BookingError::Validation(_))
        ));
    }
}
