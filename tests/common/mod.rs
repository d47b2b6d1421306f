//! Shared test harness: an in-process app over a throwaway SQLite
//! database, a mock payment gateway that counts its calls, and
//! request helpers driving the router through `tower::ServiceExt`.
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    app_router,
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::{ensure_schema, establish_connection_with_config, DbConfig, DbPool},
    errors::ServiceError,
    services::payments::{GatewayOrder, GatewayOrderRequest, PaymentGateway},
    AppState,
};

pub const TEST_JWT_SECRET: &str =
    "test-jwt-secret-test-jwt-secret-test-jwt-secret-test-jwt-secret!";
pub const TEST_RAZORPAY_KEY_ID: &str = "rzp_test_key";
pub const TEST_RAZORPAY_SECRET: &str = "test_razorpay_secret";

/// Gateway double recording every order-creation call. Tests assert
/// the count to prove invalid requests never reach the provider.
pub struct MockGateway {
    calls: AtomicUsize,
    fail_with: Mutex<Option<(u16, String)>>,
    last_request: Mutex<Option<GatewayOrderRequest>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_with: Mutex::new(None),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_with(&self, status: u16, message: &str) {
        *self.fail_with.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn last_request(&self) -> Option<GatewayOrderRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some((status, message)) = self.fail_with.lock().unwrap().take() {
            return Err(ServiceError::GatewayError { status, message });
        }
        Ok(GatewayOrder {
            id: format!("order_test_{call}"),
            amount: request.amount_minor,
            currency: request.currency,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<DbPool>,
    pub auth_service: Arc<AuthService>,
    pub gateway: Arc<MockGateway>,
    _db_path: TempDbPath,
}

/// Deletes the per-test database file on drop.
struct TempDbPath(std::path::PathBuf);

impl Drop for TempDbPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// An app with no gateway credentials configured; checkout
    /// endpoints must surface a configuration error.
    pub async fn without_payment_config() -> Self {
        Self::build(false).await
    }

    async fn build(payments_configured: bool) -> Self {
        let db_path = std::env::temp_dir().join(format!("storefront-test-{}.sqlite", Uuid::new_v4()));
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut config = AppConfig::new(
            database_url.clone(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        if payments_configured {
            config.razorpay_key_id = Some(TEST_RAZORPAY_KEY_ID.to_string());
            config.razorpay_key_secret = Some(TEST_RAZORPAY_SECRET.to_string());
        }
        let config = Arc::new(config);

        let db = Arc::new(
            establish_connection_with_config(&DbConfig {
                url: database_url,
                max_connections: 1,
                min_connections: 1,
                connect_timeout: Duration::from_secs(5),
                idle_timeout: Duration::from_secs(5),
                acquire_timeout: Duration::from_secs(5),
            })
            .await
            .expect("test database connection"),
        );
        ensure_schema(&db).await.expect("test schema");

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            TEST_JWT_SECRET.to_string(),
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
            Duration::from_secs(3600),
        )));

        let gateway = MockGateway::new();
        let gateway_for_state: Option<Arc<dyn PaymentGateway>> = if payments_configured {
            Some(gateway.clone())
        } else {
            None
        };

        let state = AppState::new(db.clone(), config, None, gateway_for_state);
        let router = app_router(state, auth_service.clone());

        Self {
            router,
            db,
            auth_service,
            gateway,
            _db_path: TempDbPath(db_path),
        }
    }

    pub fn customer_token(&self, user_id: Uuid) -> String {
        self.auth_service
            .generate_token(
                &user_id.to_string(),
                Some("customer@example.com".to_string()),
                vec!["customer".to_string()],
                vec![
                    "orders:read".to_string(),
                    "orders:write".to_string(),
                    "payments:write".to_string(),
                ],
            )
            .expect("token generation")
            .access_token
    }

    pub fn admin_token(&self) -> String {
        self.auth_service
            .generate_token(
                &Uuid::new_v4().to_string(),
                Some("admin@example.com".to_string()),
                vec!["admin".to_string()],
                vec![],
            )
            .expect("token generation")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request construction");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("response body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };
        (status, body)
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }
}

/// A one-line-item order intent body priced in minor units.
pub fn simple_order_body(unit_price_minor: i64, quantity: u32) -> Value {
    serde_json::json!({
        "line_items": [{
            "type": "simple",
            "product_id": Uuid::new_v4(),
            "size": "M",
            "quantity": quantity,
            "unit_price_minor": unit_price_minor
        }]
    })
}
