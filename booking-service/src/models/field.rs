use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound accepted for `price_per_hour`.
pub const MAX_PRICE_PER_HOUR: i64 = 1_000_000_000;

/// A rentable sports venue with an hourly price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: Uuid,
    pub name: String,
    /// Price per billed hour, in whole currency units.
    pub price_per_hour: i64,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Field {
    pub fn new(name: String, price_per_hour: i64, location: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            price_per_hour,
            location,
            created_at: now,
            updated_at: now,
        }
    }
}
