use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::booking::{BookingStatus, TimeSlot};

/// Methods accepted by manual (offline) payment processing.
pub const MANUAL_PAYMENT_METHODS: [&str; 4] = ["cash", "transfer", "credit_card", "debit_card"];

pub fn is_manual_payment_method(method: &str) -> bool {
    MANUAL_PAYMENT_METHODS.contains(&method)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::Success
    }
}

impl FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(anyhow::anyhow!("Unknown payment status '{}'", other)),
        }
    }
}

/// The monetary record owned 1:1 by a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    /// Correlation key handed to the gateway; always the booking id.
    pub gateway_order_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(booking_id: Uuid, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            status: PaymentStatus::Pending,
            payment_method: None,
            gateway_order_id: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Billable amount for a slot: `billed_hours * price_per_hour`, or `None`
/// when the product does not fit in an `i64`.
pub fn calculate_amount(slot: &TimeSlot, price_per_hour: i64) -> Option<i64> {
    slot.billed_hours().checked_mul(price_per_hour)
}

/// Map the gateway's `transaction_status` vocabulary onto a payment status.
/// Unrecognised values are treated as still pending.
pub fn map_gateway_status(transaction_status: &str) -> PaymentStatus {
    match transaction_status {
        "capture" | "settlement" => PaymentStatus::Success,
        "deny" | "cancel" | "expire" | "failure" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// Payment and/or booking were written.
    Applied,
    /// Nothing to change; a replay of a state already stored.
    Unchanged,
    /// The notification would move a successful payment backwards.
    Stale,
    /// Payment succeeded but the booking had been canceled meanwhile.
    BookingCanceled,
}

/// Writes required to apply one gateway notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTransition {
    pub payment_status: Option<PaymentStatus>,
    pub set_paid_at: bool,
    pub payment_method: Option<String>,
    pub booking_status: Option<BookingStatus>,
    pub outcome: NotificationOutcome,
}

impl NotificationTransition {
    fn untouched(outcome: NotificationOutcome) -> Self {
        Self {
            payment_status: None,
            set_paid_at: false,
            payment_method: None,
            booking_status: None,
            outcome,
        }
    }

    pub fn has_writes(&self) -> bool {
        self.payment_status.is_some()
            || self.payment_method.is_some()
            || self.booking_status.is_some()
    }
}

/// Decide how a notification carrying `incoming` changes the stored
/// (payment, booking) pair.
///
/// A successful payment is never moved; a paid or confirmed booking is never
/// regressed; only a success moves the booking, and only out of `pending`.
pub fn resolve_notification(
    payment: &Payment,
    booking: BookingStatus,
    incoming: PaymentStatus,
    method: Option<&str>,
) -> NotificationTransition {
    if payment.status.is_terminal() && incoming != PaymentStatus::Success {
        return NotificationTransition::untouched(NotificationOutcome::Stale);
    }

    let payment_method = method
        .filter(|m| !m.is_empty() && Some(*m) != payment.payment_method.as_deref())
        .map(str::to_string);

    let payment_status = (incoming != payment.status).then_some(incoming);
    let set_paid_at = payment_status == Some(PaymentStatus::Success);

    let (booking_status, canceled) = match (incoming, booking) {
        (PaymentStatus::Success, BookingStatus::Pending) => (Some(BookingStatus::Paid), false),
        (PaymentStatus::Success, BookingStatus::Canceled) => (None, true),
        _ => (None, false),
    };

    let mut transition = NotificationTransition {
        payment_status,
        set_paid_at,
        payment_method,
        booking_status,
        outcome: NotificationOutcome::Unchanged,
    };
    transition.outcome = if canceled && transition.payment_status.is_some() {
        NotificationOutcome::BookingCanceled
    } else if transition.has_writes() {
        NotificationOutcome::Applied
    } else {
        NotificationOutcome::Unchanged
    };
    transition
}
