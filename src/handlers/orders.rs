//! Order intent endpoints: create, fetch, and list. Status changes
//! never happen here; confirmation belongs to the payment callback.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    handlers::common::PaginationParams,
    models::{LineItem, ShippingAddress},
    services::orders::{CreateOrderIntentRequest, OrderIntentListResponse, OrderIntentResponse},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub line_items: Vec<LineItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub total_minor: Option<i64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

/// Create an order intent
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order intent created", body = OrderIntentResponse),
        (status = 400, description = "Invalid line items", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid credentials")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<OrderIntentResponse>, ServiceError> {
    let customer_id = parse_user_id(&user)?;
    let currency = request
        .currency
        .unwrap_or_else(|| state.config.default_currency.clone());

    let order = state
        .orders
        .create_order_intent(
            customer_id,
            CreateOrderIntentRequest {
                line_items: request.line_items,
                shipping_address: request.shipping_address,
                total_minor: request.total_minor,
                currency,
                notes: request.notes,
            },
        )
        .await?;

    Ok(Json(order))
}

/// Get an order intent by id
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order intent", body = OrderIntentResponse),
        (status = 403, description = "Order belongs to another customer"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
#[instrument(skip(state), fields(user_id = %user.user_id, order_id = %order_id))]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderIntentResponse>, ServiceError> {
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

    // Owner or admin only.
    if !user.is_admin() && order.customer_id != parse_user_id(&user)? {
        return Err(ServiceError::Forbidden(
            "order belongs to another customer".to_string(),
        ));
    }

    Ok(Json(order))
}

/// List the authenticated customer's order intents
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Order intents", body = OrderIntentListResponse),
        (status = 401, description = "Missing or invalid credentials")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
#[instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<OrderIntentListResponse>, ServiceError> {
    let customer_id = parse_user_id(&user)?;
    let orders = state
        .orders
        .list_orders(customer_id, pagination.page(), pagination.per_page())
        .await?;
    Ok(Json(orders))
}

fn parse_user_id(user: &AuthUser) -> Result<Uuid, ServiceError> {
    user.user_id
        .parse()
        .map_err(|_| ServiceError::Unauthorized("token subject is not a valid user id".to_string()))
}

pub fn orders_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .with_permission("orders:read");
    let write = Router::new()
        .route("/", post(create_order))
        .with_permission("orders:write");
    read.merge(write)
}
