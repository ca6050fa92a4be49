//! Midtrans payment gateway client.
//!
//! Snap API for hosted-checkout transactions, Core API for transaction
//! status, and `signature_key` verification for HTTP notifications.

use crate::config::GatewayConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::utils::signature::{sha512_hex, signatures_match};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Hosted-checkout transaction to open at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub order_id: String,
    pub gross_amount: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub item_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostedTransaction {
    pub token: String,
    pub redirect_url: String,
}

/// Authoritative transaction state as reported by the Core API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionStatus {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub transaction_status: String,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
}

/// HTTP notification body posted by the gateway.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayNotification {
    pub order_id: Option<String>,
    pub transaction_status: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    pub status_code: Option<String>,
    pub gross_amount: Option<String>,
    pub signature_key: Option<String>,
    pub fraud_status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<HostedTransaction, GatewayError>;

    async fn transaction_status(&self, order_id: &str) -> Result<TransactionStatus, GatewayError>;

    /// Whether the notification's `signature_key` matches
    /// `SHA512(order_id + status_code + gross_amount + server_key)`.
    fn verify_notification(&self, notification: &GatewayNotification) -> bool;
}

#[derive(Debug, Serialize)]
struct SnapRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    customer_details: CustomerDetails<'a>,
    item_details: [ItemDetails<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct CustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ItemDetails<'a> {
    id: &'a str,
    name: &'a str,
    price: i64,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct MidtransErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
    #[serde(default)]
    status_message: Option<String>,
}

impl MidtransErrorBody {
    fn message(self, fallback: &str) -> String {
        if !self.error_messages.is_empty() {
            self.error_messages.join("; ")
        } else {
            self.status_message.unwrap_or_else(|| fallback.to_string())
        }
    }
}

/// Midtrans client authenticated with the server key.
#[derive(Clone)]
pub struct MidtransClient {
    client: Client,
    config: GatewayConfig,
}

impl MidtransClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    /// Bound a gateway call by the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        }
    }

    fn map_transport(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.config.timeout())
        } else {
            GatewayError::Transport(err)
        }
    }

    fn expected_signature(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        sha512_hex(&[
            order_id,
            status_code,
            gross_amount,
            self.config.server_key.expose_secret(),
        ])
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<HostedTransaction, GatewayError> {
        let body = SnapRequest {
            transaction_details: TransactionDetails {
                order_id: &request.order_id,
                gross_amount: request.gross_amount,
            },
            customer_details: CustomerDetails {
                first_name: &request.customer_name,
                email: &request.customer_email,
            },
            item_details: [ItemDetails {
                id: &request.order_id,
                name: &request.item_name,
                price: request.gross_amount,
                quantity: 1,
            }],
        };
        let url = format!("{}/transactions", self.config.snap_base_url);

        self.bounded(async {
            let response = self
                .client
                .post(&url)
                .basic_auth(self.config.server_key.expose_secret(), Some(""))
                .json(&body)
                .send()
                .await
                .map_err(|e| self.map_transport(e))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| self.map_transport(e))?;

            tracing::debug!(status = %status, order_id = %request.order_id, "Midtrans create_transaction response");

            if status.is_success() {
                let transaction: HostedTransaction = serde_json::from_str(&text)
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                tracing::info!(
                    order_id = %request.order_id,
                    gross_amount = request.gross_amount,
                    "Midtrans transaction created"
                );
                Ok(transaction)
            } else {
                let message = serde_json::from_str::<MidtransErrorBody>(&text)
                    .map(|b| b.message(&text))
                    .unwrap_or(text);
                tracing::error!(
                    status = status.as_u16(),
                    order_id = %request.order_id,
                    message = %message,
                    "Midtrans transaction creation failed"
                );
                Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        })
        .await
    }

    async fn transaction_status(&self, order_id: &str) -> Result<TransactionStatus, GatewayError> {
        let url = format!("{}/{}/status", self.config.api_base_url, order_id);

        self.bounded(async {
            let response = self
                .client
                .get(&url)
                .basic_auth(self.config.server_key.expose_secret(), Some(""))
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| self.map_transport(e))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| self.map_transport(e))?;

            if !status.is_success() {
                return Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message: text,
                });
            }

            let parsed: TransactionStatus = serde_json::from_str(&text)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

            // The Core API reports unknown orders in the body with HTTP 200.
            if parsed.transaction_status.is_empty() {
                let code = parsed
                    .status_code
                    .as_deref()
                    .and_then(|c| c.parse::<u16>().ok())
                    .unwrap_or(404);
                let message = serde_json::from_str::<MidtransErrorBody>(&text)
                    .map(|b| b.message("transaction not found"))
                    .unwrap_or_else(|_| "transaction not found".to_string());
                return Err(GatewayError::Rejected {
                    status: code,
                    message,
                });
            }

            tracing::debug!(
                order_id = %order_id,
                transaction_status = %parsed.transaction_status,
                "Midtrans transaction status"
            );
            Ok(parsed)
        })
        .await
    }

    fn verify_notification(&self, notification: &GatewayNotification) -> bool {
        let (Some(order_id), Some(status_code), Some(gross_amount), Some(provided)) = (
            notification.order_id.as_deref(),
            notification.status_code.as_deref(),
            notification.gross_amount.as_deref(),
            notification.signature_key.as_deref(),
        ) else {
            tracing::warn!("Notification is missing signature inputs");
            return false;
        };

        let expected = self.expected_signature(order_id, status_code, gross_amount);
        let is_valid = signatures_match(&expected, provided);
        if !is_valid {
            tracing::warn!(order_id = %order_id, "Notification signature verification failed");
        }
        is_valid
    }
}

/// Item label shown on the hosted checkout page.
pub fn item_description(field_name: &str, start: chrono::DateTime<chrono::Utc>) -> String {
    format!("Booking {} - {}", field_name, start.format("%d %b %Y %H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayEnvironment;
    use chrono::TimeZone;

    fn client() -> MidtransClient {
        MidtransClient::new(GatewayConfig::new("SB-Mid-server-test", GatewayEnvironment::Sandbox))
            .unwrap()
    }

    fn notification(signature: Option<String>) -> GatewayNotification {
        GatewayNotification {
            order_id: Some("0b7f7c4e-order".into()),
            transaction_status: Some("settlement".into()),
            status_code: Some("200".into()),
            gross_amount: Some("200000.00".into()),
            signature_key: signature,
            ..Default::default()
        }
    }

    #[test]
    fn valid_signature_is_accepted() {
        let client = client();
        let expected = sha512_hex(&["0b7f7c4e-order", "200", "200000.00", "SB-Mid-server-test"]);
        assert!(client.verify_notification(&notification(Some(expected.to_uppercase()))));
    }

    #[test]
    fn tampered_or_missing_signature_is_rejected() {
        let client = client();
        let forged = sha512_hex(&["0b7f7c4e-order", "200", "1.00", "SB-Mid-server-test"]);
        assert!(!client.verify_notification(&notification(Some(forged))));
        assert!(!client.verify_notification(&notification(None)));
    }

    #[test]
    fn item_description_uses_day_month_year() {
        let start = chrono::Utc.with_ymd_and_hms(2030, 1, 2, 15, 4, 0).unwrap();
        assert_eq!(
            item_description("Lapangan A", start),
            "Booking Lapangan A - 02 Jan 2030 15:04"
        );
    }
}
