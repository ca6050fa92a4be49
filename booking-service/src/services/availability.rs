use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::TimeSlot;
use crate::services::error::BookingError;
use crate::services::repository::Repository;

/// Answers whether a slot on a field is free.
///
/// The answer is advisory: it reserves nothing. Inserts re-check under the
/// repository's per-field serialisation.
#[derive(Clone)]
pub struct AvailabilityService {
    repo: Arc<dyn Repository>,
}

impl AvailabilityService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// `true` when an active booking on `field_id` intersects `[start, end)`.
    pub async fn check_overlap(
        &self,
        field_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        self.repo.has_overlap(field_id, TimeSlot::new(start, end)).await
    }
}
