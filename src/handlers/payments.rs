//! Checkout payment endpoints.
//!
//! Two operations: mint a provider-side payment order for an
//! authenticated user, and verify the signed callback the client
//! posts back after paying. Order creation requires a bearer token;
//! verification is gated by the callback signature itself, so the
//! route takes no credentials. The HMAC secret never leaves the
//! server; only the public key id is returned to the browser.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    events::Event,
    models::OrderStatus,
    services::{
        payments::GatewayOrderRequest,
        signature::verify_signature,
    },
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentOrderRequest {
    /// Amount in major currency units (e.g., rupees). Converted to
    /// integer minor units before anything leaves this handler.
    pub amount: Decimal,
    pub currency: Option<String>,
    /// Caller-provided receipt string; generated when absent.
    pub receipt: Option<String>,
    /// Caller notes, merged with the caller's identity before being
    /// forwarded to the gateway.
    pub notes: Option<Value>,
    /// Local order intent to tag the payment order with, if one
    /// already exists.
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentOrderResponse {
    /// Provider-side payment order id, consumed by the hosted
    /// checkout widget.
    pub order_id: String,
    /// Amount in minor units, echoed from the provider.
    pub amount: i64,
    pub currency: String,
    /// Public API key id. Safe for the browser; the secret is not.
    pub key_id: String,
    pub user_id: String,
}

/// Callback posted by the client after the hosted checkout completes.
/// Field names are the provider's wire names, verbatim. The callback
/// fields are optional at the type level so an incomplete body gets
/// the `verified: false` envelope instead of a bare decode rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    /// Local order intent to confirm on success.
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    /// Gateway payment id, echoed back on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Failure reason; present exactly when `verified` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatus>,
}

impl VerifyPaymentResponse {
    fn rejected(error: &str) -> Self {
        Self {
            verified: false,
            payment_id: None,
            error: Some(error.to_string()),
            message: None,
            order_id: None,
            order_status: None,
        }
    }
}

/// Converts a major-unit amount to integer minor units (x100),
/// rounding half away from zero. Rejects non-positive amounts before
/// any conversion happens.
fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "amount must be greater than zero".to_string(),
        ));
    }
    let minor = (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    minor.to_i64().ok_or_else(|| {
        ServiceError::InvalidInput(format!("amount {} is out of range", amount))
    })
}

/// Create a provider-side payment order
#[utoipa::path(
    post,
    path = "/api/v1/payments/orders",
    request_body = CreatePaymentOrderRequest,
    responses(
        (status = 200, description = "Payment order created", body = CreatePaymentOrderResponse),
        (status = 400, description = "Invalid amount", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 500, description = "Payment gateway not configured", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn create_payment_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreatePaymentOrderRequest>,
) -> Result<Json<CreatePaymentOrderResponse>, ServiceError> {
    let amount_minor = to_minor_units(request.amount)?;

    let key_id = state
        .config
        .razorpay_key_id
        .clone()
        .ok_or_else(|| ServiceError::Misconfigured("razorpay_key_id is not set".to_string()))?;
    let gateway = state
        .gateway
        .clone()
        .ok_or_else(|| ServiceError::Misconfigured("payment gateway is not set".to_string()))?;

    let currency = request
        .currency
        .unwrap_or_else(|| state.config.default_currency.clone());
    let receipt = request
        .receipt
        .unwrap_or_else(|| format!("rcpt_{}", Uuid::new_v4().simple()));

    // Caller notes travel to the gateway with the caller's identity
    // stamped over them.
    let mut notes = request.notes.unwrap_or_else(|| json!({}));
    if !notes.is_object() {
        return Err(ServiceError::ValidationError(
            "notes must be a JSON object".to_string(),
        ));
    }
    notes["user_id"] = json!(user.user_id);
    if let Some(order_id) = request.order_id {
        notes["order_id"] = json!(order_id);
    }

    let gateway_order = gateway
        .create_order(GatewayOrderRequest {
            amount_minor,
            currency,
            receipt,
            notes,
        })
        .await?;

    info!(
        provider_order_id = %gateway_order.id,
        amount_minor,
        "payment order created"
    );

    if let Some(order_id) = request.order_id {
        // Traceability only; the intent stays pending until the
        // signed callback is verified.
        if let Err(e) = state
            .orders
            .attach_provider_order(order_id, &gateway_order.id)
            .await
        {
            warn!(error = %e, %order_id, "failed to attach provider order id");
        }
    }

    if let Some(event_sender) = &state.event_sender {
        if let Err(e) = event_sender
            .send(Event::PaymentOrderCreated {
                user_id: user.user_id.clone(),
                provider_order_id: gateway_order.id.clone(),
                amount_minor,
            })
            .await
        {
            warn!(error = %e, "failed to send payment order created event");
        }
    }

    Ok(Json(CreatePaymentOrderResponse {
        order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
        key_id,
        user_id: user.user_id,
    }))
}

/// Verify a signed payment callback
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Signature verified", body = VerifyPaymentResponse),
        (status = 400, description = "Signature mismatch or incomplete callback", body = VerifyPaymentResponse),
        (status = 500, description = "Verification secret not configured", body = VerifyPaymentResponse)
    ),
    tag = "payments"
)]
#[instrument(skip(state, request))]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> (StatusCode, Json<VerifyPaymentResponse>) {
    let secret = match state.config.razorpay_key_secret.as_deref() {
        Some(secret) => secret,
        None => {
            warn!("payment verification attempted without a configured secret");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyPaymentResponse::rejected(
                    "Service is not configured for payments",
                )),
            );
        }
    };

    let (provider_order_id, payment_id, supplied_signature) = match (
        request.razorpay_order_id.as_deref(),
        request.razorpay_payment_id.as_deref(),
        request.razorpay_signature.as_deref(),
    ) {
        (Some(order_id), Some(payment_id), Some(signature)) => {
            (order_id, payment_id, signature)
        }
        _ => {
            warn!("payment callback missing required fields");
            return (
                StatusCode::BAD_REQUEST,
                Json(VerifyPaymentResponse::rejected(
                    "missing required callback fields",
                )),
            );
        }
    };

    let verified = verify_signature(provider_order_id, payment_id, supplied_signature, secret);

    if !verified {
        warn!(%payment_id, %provider_order_id, "payment signature mismatch");
        if let Some(event_sender) = &state.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentVerificationFailed {
                    provider_order_id: provider_order_id.to_string(),
                })
                .await
            {
                warn!(error = %e, "failed to send verification failed event");
            }
        }
        return (
            StatusCode::BAD_REQUEST,
            Json(VerifyPaymentResponse::rejected(
                "payment signature verification failed",
            )),
        );
    }

    info!(%payment_id, %provider_order_id, "payment signature verified");

    let mut order_status = None;
    let mut message = None;
    if let Some(order_id) = request.order_id {
        match state.orders.confirm_payment(order_id, payment_id).await {
            Ok(order) => {
                order_status = Some(order.status);
            }
            Err(e) => {
                // The signature is already proven genuine; a failed
                // status write must not tell the client the payment
                // was rejected. Logged for reconciliation instead.
                warn!(
                    error = %e,
                    %order_id,
                    "payment verified but order confirmation failed"
                );
                message = Some("payment verified; order confirmation pending".to_string());
            }
        }
    }

    (
        StatusCode::OK,
        Json(VerifyPaymentResponse {
            verified: true,
            payment_id: Some(payment_id.to_string()),
            error: None,
            message,
            order_id: request.order_id,
            order_status,
        }),
    )
}

pub fn payments_routes() -> Router<AppState> {
    let create = Router::new()
        .route("/orders", post(create_payment_order))
        .with_permission("payments:write");
    // The callback is authenticated by its signature, not a token.
    let verify = Router::new().route("/verify", post(verify_payment));
    create.merge(verify)
}
