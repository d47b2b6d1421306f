//! Payment gateway client.
//!
//! [`PaymentGateway`] is the seam between the checkout handlers and
//! the provider's HTTP API; [`RazorpayClient`] is the production
//! implementation. Order creation is the only outbound call this
//! service makes — verification is local crypto (`signature` module).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, instrument};

use crate::errors::ServiceError;

const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Request to mint a provider-side payment order. `amount_minor` is
/// already in integer minor units.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: Value,
}

/// Provider-side payment order. Ephemeral: lives only in the
/// gateway's system and the client's checkout state.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Gateway seam. Mocked in tests to assert call counts and inputs.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: GatewayOrderRequest)
        -> Result<GatewayOrder, ServiceError>;
}

/// Razorpay Orders API client using HTTP Basic auth built from the
/// configured key id/secret.
pub struct RazorpayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a Value,
}

impl RazorpayClient {
    pub fn new(key_id: String, key_secret: String) -> Self {
        Self::with_base_url(key_id, key_secret, RAZORPAY_API_BASE.to_string())
    }

    pub fn with_base_url(key_id: String, key_secret: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(GATEWAY_TIMEOUT)
                .build()
                .expect("reqwest client construction"),
            key_id,
            key_secret,
            base_url,
        }
    }

    /// Pulls the provider's human-readable description out of its
    /// error envelope, falling back to the raw body.
    fn error_description(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("description"))
                    .and_then(|d| d.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, request), fields(amount_minor = request.amount_minor, currency = %request.currency))]
    async fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, ServiceError> {
        let body = CreateOrderBody {
            amount: request.amount_minor,
            currency: &request.currency,
            receipt: &request.receipt,
            notes: &request.notes,
        };

        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "gateway order creation request failed");
                ServiceError::GatewayError {
                    status: 502,
                    message: format!("gateway unreachable: {}", e),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let description = Self::error_description(&text);
            error!(status = status.as_u16(), %description, "gateway rejected order creation");
            return Err(ServiceError::GatewayError {
                status: status.as_u16(),
                message: description,
            });
        }

        response.json::<GatewayOrder>().await.map_err(|e| {
            ServiceError::SerializationError(format!("invalid gateway order response: {}", e))
        })
    }
}
