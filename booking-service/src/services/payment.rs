use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::payment::is_manual_payment_method;
use crate::models::{
    calculate_amount, map_gateway_status, NotificationOutcome, Payment, PaymentStatus,
};
use crate::services::error::BookingError;
use crate::services::gateway::{
    item_description, GatewayError, GatewayNotification, PaymentGateway, TransactionRequest,
};
use crate::services::metrics::{
    record_gateway_failure, record_notification_ignored, record_payment_transition,
};
use crate::services::repository::{PaymentNotification, Repository};

/// Transaction id reported when the gateway cannot yet name one.
pub const PENDING_TRANSACTION_ID: &str = "pending";

/// Result of opening a hosted-checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentTransaction {
    pub payment_id: Uuid,
    pub token: String,
    pub redirect_url: String,
    pub transaction_id: String,
    pub amount: i64,
}

/// What a notification did to the stored payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationReceipt {
    pub booking_id: Uuid,
    pub outcome: NotificationOutcome,
    pub payment_status: PaymentStatus,
}

#[derive(Clone)]
pub struct PaymentService {
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn PaymentGateway>,
    verify_notifications: bool,
}

impl PaymentService {
    /// With `verify_notifications` set, the status carried by a notification
    /// is replaced by the one the gateway reports for the order.
    pub fn new(
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn PaymentGateway>,
        verify_notifications: bool,
    ) -> Self {
        Self {
            repo,
            gateway,
            verify_notifications,
        }
    }

    pub async fn get_payment_by_booking(&self, booking_id: Uuid) -> Result<Payment, BookingError> {
        self.repo
            .get_payment_by_booking(booking_id)
            .await?
            .ok_or(BookingError::PaymentNotFound(booking_id))
    }

    /// Settle a booking's payment offline.
    pub async fn process_payment(
        &self,
        booking_id: Uuid,
        payment_method: &str,
    ) -> Result<Payment, BookingError> {
        if !is_manual_payment_method(payment_method) {
            return Err(BookingError::InvalidPaymentMethod);
        }

        let (payment, booking) = self
            .repo
            .complete_payment(booking_id, payment_method, Utc::now())
            .await?;

        record_payment_transition("manual", PaymentStatus::Success.as_str());
        tracing::info!(
            booking_id = %booking_id,
            payment_id = %payment.id,
            booking_status = booking.status.as_str(),
            payment_method = %payment_method,
            "Payment processed"
        );
        Ok(payment)
    }

    /// Open a hosted-checkout transaction for the booking's payment.
    ///
    /// The payment is reset to `pending` with a freshly computed amount before
    /// the gateway is called. A gateway error or timeout marks it `failed`.
    pub async fn create_payment_transaction(
        &self,
        booking_id: Uuid,
    ) -> Result<PaymentTransaction, BookingError> {
        let existing = self.get_payment_by_booking(booking_id).await?;
        if existing.status == PaymentStatus::Success {
            return Err(BookingError::PaymentAlreadyProcessed);
        }

        let booking = self
            .repo
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        let field = self
            .repo
            .get_field(booking.field_id)
            .await?
            .ok_or(BookingError::FieldNotFound(booking.field_id))?;
        let user = self
            .repo
            .get_user(booking.user_id)
            .await?
            .ok_or(BookingError::UserNotFound(booking.user_id))?;

        let amount = calculate_amount(&booking.slot(), field.price_per_hour)
            .ok_or(BookingError::AmountTooLarge)?;
        let order_id = booking.id.to_string();
        let payment = self
            .repo
            .prepare_payment_attempt(booking_id, amount, &order_id)
            .await?;

        let request = TransactionRequest {
            order_id: order_id.clone(),
            gross_amount: amount,
            customer_name: user.name.clone(),
            customer_email: user.email.clone(),
            item_name: item_description(&field.name, booking.start_time),
        };

        let hosted = match self.gateway.create_transaction(&request).await {
            Ok(hosted) => hosted,
            Err(err) => return Err(self.fail_attempt(booking_id, err).await),
        };

        let transaction_id = match self.gateway.transaction_status(&order_id).await {
            Ok(status) if !status.transaction_id.is_empty() => status.transaction_id,
            Ok(_) => PENDING_TRANSACTION_ID.to_string(),
            Err(err) => {
                tracing::debug!(order_id = %order_id, error = %err, "Transaction id not yet available");
                PENDING_TRANSACTION_ID.to_string()
            }
        };

        tracing::info!(
            booking_id = %booking_id,
            payment_id = %payment.id,
            amount = amount,
            "Payment transaction created"
        );

        Ok(PaymentTransaction {
            payment_id: payment.id,
            token: hosted.token,
            redirect_url: hosted.redirect_url,
            transaction_id,
            amount,
        })
    }

    async fn fail_attempt(&self, booking_id: Uuid, err: GatewayError) -> BookingError {
        record_gateway_failure("create_transaction");
        tracing::warn!(booking_id = %booking_id, error = %err, "Gateway transaction failed");

        match self.repo.fail_payment_attempt(booking_id).await {
            Ok(true) => record_payment_transition("gateway", PaymentStatus::Failed.as_str()),
            Ok(false) => {
                tracing::warn!(booking_id = %booking_id, "Payment left unchanged; no longer pending")
            }
            Err(e) => {
                tracing::error!(booking_id = %booking_id, error = %e, "Failed to mark payment failed");
                return e;
            }
        }
        BookingError::Gateway(err.to_string())
    }

    /// Apply a gateway notification. Replays and out-of-order deliveries are
    /// absorbed: a successful payment is never moved backwards.
    pub async fn handle_payment_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<NotificationReceipt, BookingError> {
        let order_id = notification
            .order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BookingError::Validation("Invalid notification payload: order_id missing".into())
            })?;
        let booking_id = Uuid::parse_str(order_id).map_err(|_| {
            BookingError::Validation(format!("Invalid notification order_id '{}'", order_id))
        })?;

        let (transaction_status, payment_type) = if self.verify_notifications {
            let status = self.gateway.transaction_status(order_id).await.map_err(|e| {
                record_gateway_failure("transaction_status");
                tracing::warn!(order_id = %order_id, error = %e, "Notification status lookup failed");
                BookingError::Gateway(e.to_string())
            })?;
            (status.transaction_status, status.payment_type)
        } else {
            (
                notification.transaction_status.clone().unwrap_or_default(),
                notification.payment_type.clone(),
            )
        };

        let status = map_gateway_status(&transaction_status);
        let applied = self
            .repo
            .apply_payment_notification(PaymentNotification {
                booking_id,
                status,
                payment_method: payment_type.filter(|t| !t.is_empty()),
                received_at: Utc::now(),
            })
            .await?;

        let outcome = applied.transition.outcome;
        match outcome {
            NotificationOutcome::Applied => {
                if let Some(new_status) = applied.transition.payment_status {
                    record_payment_transition("notification", new_status.as_str());
                }
            }
            NotificationOutcome::Unchanged => {
                tracing::debug!(booking_id = %booking_id, "Notification already applied");
            }
            NotificationOutcome::Stale => {
                record_notification_ignored("stale");
                tracing::warn!(
                    booking_id = %booking_id,
                    transaction_status = %transaction_status,
                    "Ignoring notification that would regress a successful payment"
                );
            }
            NotificationOutcome::BookingCanceled => {
                record_payment_transition("notification", PaymentStatus::Success.as_str());
                record_notification_ignored("booking_canceled");
                tracing::warn!(
                    booking_id = %booking_id,
                    "Payment succeeded for a canceled booking; needs operator follow-up"
                );
            }
        }

        tracing::info!(
            booking_id = %booking_id,
            transaction_status = %transaction_status,
            payment_status = applied.payment.status.as_str(),
            booking_status = applied.booking.status.as_str(),
            "Payment notification handled"
        );

        Ok(NotificationReceipt {
            booking_id,
            outcome,
            payment_status: applied.payment.status,
        })
    }
}
