//! PostgreSQL repository for booking-service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    resolve_notification, Booking, BookingStatus, Field, Payment, PaymentStatus, Role, TimeSlot,
    User,
};
use crate::services::error::BookingError;
use crate::services::metrics::record_db_query;
use crate::services::repository::{
    ensure_completable, AppliedNotification, PaymentNotification, RepoResult, Repository,
};

const EXCLUSION_VIOLATION: &str = "23P01";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = BookingError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse::<Role>()?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct FieldRow {
    id: Uuid,
    name: String,
    price_per_hour: i64,
    location: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FieldRow> for Field {
    fn from(row: FieldRow) -> Self {
        Field {
            id: row.id,
            name: row.name,
            price_per_hour: row.price_per_hour,
            location: row.location,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    field_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            field_id: row.field_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status.parse::<BookingStatus>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    amount: i64,
    status: String,
    payment_method: Option<String>,
    gateway_order_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = BookingError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            amount: row.amount,
            status: row.status.parse::<PaymentStatus>()?,
            payment_method: row.payment_method,
            gateway_order_id: row.gateway_order_id,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Map constraint violations onto domain errors; everything else is internal.
fn map_db_error(err: sqlx::Error) -> BookingError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return BookingError::TimeSlotOverlap;
        }
        if db_err.is_unique_violation() && db_err.constraint() == Some("fields_name_key") {
            return BookingError::DuplicateFieldName;
        }
    }
    BookingError::from(err)
}

/// Repository backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(database_url), fields(service = "booking-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Lock the booking and its payment, in that order, for the rest of `tx`.
    async fn lock_pair(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> RepoResult<(Payment, Booking)> {
        let booking: Booking = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, field_id, start_time, end_time, status, created_at, updated_at
            FROM bookings
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(BookingError::BookingNotFound(booking_id))?
        .try_into()?;

        let payment: Payment = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, amount, status, payment_method, gateway_order_id, paid_at, created_at, updated_at
            FROM payments
            WHERE booking_id = $1
            FOR UPDATE
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(BookingError::PaymentNotFound(booking_id))?
        .try_into()?;

        Ok((payment, booking))
    }

    async fn set_booking_status(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> RepoResult<Booking> {
        sqlx::query_as::<_, BookingRow>(
            r#"
            UPDATE bookings
            SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, user_id, field_id, start_time, end_time, status, created_at, updated_at
            "#,
        )
        .bind(booking_id)
        .bind(status.as_str())
        .bind(at)
        .fetch_one(&mut **tx)
        .await?
        .try_into()
    }
}

#[async_trait]
impl Repository for PgRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create_user(&self, user: User) -> RepoResult<User> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, email, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, role, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                BookingError::Validation(format!("User with email '{}' already exists", user.email))
            }
            other => BookingError::from(other),
        })?
        .try_into()
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    #[instrument(skip(self, field), fields(field_name = %field.name))]
    async fn create_field(&self, field: Field) -> RepoResult<Field> {
        let row = sqlx::query_as::<_, FieldRow>(
            r#"
            INSERT INTO fields (id, name, price_per_hour, location, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, price_per_hour, location, created_at, updated_at
            "#,
        )
        .bind(field.id)
        .bind(&field.name)
        .bind(field.price_per_hour)
        .bind(&field.location)
        .bind(field.created_at)
        .bind(field.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        info!(field_id = %row.id, "Field created");
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn get_field(&self, id: Uuid) -> RepoResult<Option<Field>> {
        let row = sqlx::query_as::<_, FieldRow>(
            r#"
            SELECT id, name, price_per_hour, location, created_at, updated_at
            FROM fields
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Field::from))
    }

    #[instrument(skip(self))]
    async fn list_fields(&self) -> RepoResult<Vec<Field>> {
        let rows = sqlx::query_as::<_, FieldRow>(
            r#"
            SELECT id, name, price_per_hour, location, created_at, updated_at
            FROM fields
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Field::from).collect())
    }

    #[instrument(skip(self, field), fields(field_id = %field.id))]
    async fn update_field(&self, field: Field) -> RepoResult<Field> {
        let row = sqlx::query_as::<_, FieldRow>(
            r#"
            UPDATE fields
            SET name = $2, price_per_hour = $3, location = $4, updated_at = $5
            WHERE id = $1
            RETURNING id, name, price_per_hour, location, created_at, updated_at
            "#,
        )
        .bind(field.id)
        .bind(&field.name)
        .bind(field.price_per_hour)
        .bind(&field.location)
        .bind(field.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or(BookingError::FieldNotFound(field.id))?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete_field(&self, id: Uuid) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM fields WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err)
                    if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
                {
                    BookingError::Validation("Field has bookings and cannot be deleted".to_string())
                }
                other => BookingError::from(other),
            })?;

        if result.rows_affected() == 0 {
            return Err(BookingError::FieldNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn has_overlap(&self, field_id: Uuid, slot: TimeSlot) -> RepoResult<bool> {
        let started = Instant::now();
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE field_id = $1
                  AND status <> 'canceled'
                  AND start_time < $3
                  AND $2 < end_time
            )
            "#,
        )
        .bind(field_id)
        .bind(slot.start)
        .bind(slot.end)
        .fetch_one(&self.pool)
        .await?;
        record_db_query("has_overlap", started);
        Ok(exists)
    }

    #[instrument(skip(self, booking, payment), fields(booking_id = %booking.id, field_id = %booking.field_id))]
    async fn create_booking_with_payment(
        &self,
        booking: Booking,
        payment: Payment,
    ) -> RepoResult<(Booking, Payment)> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        // Serialise bookings per field for the re-check below.
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM fields WHERE id = $1 FOR UPDATE")
            .bind(booking.field_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(BookingError::FieldNotFound(booking.field_id));
        }

        let overlapping = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE field_id = $1
                  AND status <> 'canceled'
                  AND start_time < $3
                  AND $2 < end_time
            )
            "#,
        )
        .bind(booking.field_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_one(&mut *tx)
        .await?;
        if overlapping {
            return Err(BookingError::TimeSlotOverlap);
        }

        let booking: Booking = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (id, user_id, field_id, start_time, end_time, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, field_id, start_time, end_time, status, created_at, updated_at
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.field_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?
        .try_into()?;

        let payment: Payment = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (id, booking_id, amount, status, payment_method, gateway_order_id, paid_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, booking_id, amount, status, payment_method, gateway_order_id, paid_at, created_at, updated_at
            "#,
        )
        .bind(payment.id)
        .bind(booking.id)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(&payment.payment_method)
        .bind(&payment.gateway_order_id)
        .bind(payment.paid_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        tx.commit().await.map_err(map_db_error)?;
        record_db_query("create_booking_with_payment", started);

        info!(amount = payment.amount, "Booking and payment stored");
        Ok((booking, payment))
    }

    #[instrument(skip(self))]
    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, field_id, start_time, end_time, status, created_at, updated_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Booking::try_from)
        .transpose()
    }

    #[instrument(skip(self))]
    async fn list_bookings_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, user_id, field_id, start_time, end_time, status, created_at, updated_at
            FROM bookings
            WHERE user_id = $1
            ORDER BY start_time DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Booking::try_from)
        .collect()
    }

    #[instrument(skip(self))]
    async fn get_payment_by_booking(&self, booking_id: Uuid) -> RepoResult<Option<Payment>> {
        sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, amount, status, payment_method, gateway_order_id, paid_at, created_at, updated_at
            FROM payments
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Payment::try_from)
        .transpose()
    }

    #[instrument(skip(self))]
    async fn complete_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
        paid_at: DateTime<Utc>,
    ) -> RepoResult<(Payment, Booking)> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let (payment, booking) = Self::lock_pair(&mut tx, booking_id).await?;
        ensure_completable(&payment, &booking)?;

        let payment: Payment = sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payments
            SET status = 'success', paid_at = $2, payment_method = $3, updated_at = $2
            WHERE booking_id = $1
            RETURNING id, booking_id, amount, status, payment_method, gateway_order_id, paid_at, created_at, updated_at
            "#,
        )
        .bind(booking_id)
        .bind(paid_at)
        .bind(payment_method)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        let booking = if booking.status == BookingStatus::Pending {
            Self::set_booking_status(&mut tx, booking_id, BookingStatus::Paid, paid_at).await?
        } else {
            booking
        };

        tx.commit().await?;
        record_db_query("complete_payment", started);
        Ok((payment, booking))
    }

    #[instrument(skip(self))]
    async fn prepare_payment_attempt(
        &self,
        booking_id: Uuid,
        amount: i64,
        order_id: &str,
    ) -> RepoResult<Payment> {
        let updated = sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payments
            SET amount = $2, status = 'pending', gateway_order_id = $3, updated_at = NOW()
            WHERE booking_id = $1 AND status <> 'success'
            RETURNING id, booking_id, amount, status, payment_method, gateway_order_id, paid_at, created_at, updated_at
            "#,
        )
        .bind(booking_id)
        .bind(amount)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => row.try_into(),
            None => match self.get_payment_by_booking(booking_id).await? {
                Some(_) => Err(BookingError::PaymentAlreadyProcessed),
                None => Err(BookingError::PaymentNotFound(booking_id)),
            },
        }
    }

    #[instrument(skip(self))]
    async fn fail_payment_attempt(&self, booking_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = NOW()
            WHERE booking_id = $1 AND status = 'pending'
            "#,
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get_payment_by_booking(booking_id).await? {
            Some(_) => Ok(false),
            None => Err(BookingError::PaymentNotFound(booking_id)),
        }
    }

    #[instrument(skip(self, notification), fields(booking_id = %notification.booking_id, status = notification.status.as_str()))]
    async fn apply_payment_notification(
        &self,
        notification: PaymentNotification,
    ) -> RepoResult<AppliedNotification> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let (payment, booking) = Self::lock_pair(&mut tx, notification.booking_id).await?;

        let transition = resolve_notification(
            &payment,
            booking.status,
            notification.status,
            notification.payment_method.as_deref(),
        );
        let at = notification.received_at;

        let payment = if transition.payment_status.is_some() || transition.payment_method.is_some() {
            sqlx::query_as::<_, PaymentRow>(
                r#"
                UPDATE payments
                SET status = COALESCE($2, status),
                    payment_method = COALESCE($3, payment_method),
                    paid_at = CASE WHEN $4 THEN $5 ELSE paid_at END,
                    updated_at = $5
                WHERE booking_id = $1
                RETURNING id, booking_id, amount, status, payment_method, gateway_order_id, paid_at, created_at, updated_at
                "#,
            )
            .bind(notification.booking_id)
            .bind(transition.payment_status.map(|s| s.as_str()))
            .bind(transition.payment_method.as_deref())
            .bind(transition.set_paid_at)
            .bind(at)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?
        } else {
            payment
        };

        let booking = match transition.booking_status {
            Some(status) => {
                Self::set_booking_status(&mut tx, notification.booking_id, status, at).await?
            }
            None => booking,
        };

        tx.commit().await?;
        record_db_query("apply_payment_notification", started);

        Ok(AppliedNotification {
            transition,
            payment,
            booking,
        })
    }
}
