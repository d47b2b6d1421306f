use crate::{
    db::DbPool,
    entities::order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{LineItem, OrderStatus, ShippingAddress},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderIntentRequest {
    pub line_items: Vec<LineItem>,
    pub shipping_address: Option<ShippingAddress>,
    /// Declared total in minor units; cross-checked against the line
    /// item sum when present.
    pub total_minor: Option<i64>,
    pub currency: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderIntentResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub currency: String,
    pub total_minor: i64,
    pub line_items: Vec<LineItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderIntentListResponse {
    pub orders: Vec<OrderIntentResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service owning the order intent lifecycle. The only writer of the
/// `pending -> confirmed` transition is [`OrderIntentService::confirm_payment`].
#[derive(Clone)]
pub struct OrderIntentService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderIntentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new pending order intent, validating line items and
    /// the address snapshot at the store boundary.
    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn create_order_intent(
        &self,
        customer_id: Uuid,
        request: CreateOrderIntentRequest,
    ) -> Result<OrderIntentResponse, ServiceError> {
        if request.line_items.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one line item".to_string(),
            ));
        }
        for item in &request.line_items {
            item.validate()?;
        }
        if let Some(address) = &request.shipping_address {
            address
                .validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }

        let computed_total: i64 = request
            .line_items
            .iter()
            .map(LineItem::line_total_minor)
            .sum();
        if let Some(declared) = request.total_minor {
            if declared != computed_total {
                return Err(ServiceError::ValidationError(format!(
                    "declared total {} does not match line item sum {}",
                    declared, computed_total
                )));
            }
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number(order_id);

        let line_items = serde_json::to_value(&request.line_items)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        let shipping_address = request
            .shipping_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;

        let active = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            customer_id: Set(customer_id),
            status: Set(OrderStatus::Pending.to_string()),
            currency: Set(request.currency),
            total_minor: Set(computed_total),
            line_items: Set(line_items),
            shipping_address: Set(shipping_address),
            provider_order_id: Set(None),
            provider_payment_id: Set(None),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let model = active.insert(db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to create order intent");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, total_minor = computed_total, "order intent created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "failed to send order created event");
            }
        }

        model_to_response(model)
    }

    /// Retrieves an order intent by id.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<OrderIntentResponse>, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id).one(db).await?;
        order.map(model_to_response).transpose()
    }

    /// Lists a customer's order intents with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderIntentListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = OrderEntity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let orders = orders
            .into_iter()
            .map(model_to_response)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderIntentListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Marks an order intent as confirmed and records the provider
    /// payment reference.
    ///
    /// Idempotent: re-confirming an already-confirmed order is a
    /// no-op success. Confirming an order in any other terminal state
    /// is a validation error; this subsystem performs only the
    /// `pending -> confirmed` transition.
    #[instrument(skip(self), fields(order_id = %order_id, payment_id = %provider_payment_id))]
    pub async fn confirm_payment(
        &self,
        order_id: Uuid,
        provider_payment_id: &str,
    ) -> Result<OrderIntentResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "order not found for payment confirmation");
                ServiceError::NotFound(format!("order {} not found", order_id))
            })?;

        let status = parse_status(&order.status)?;
        match status {
            OrderStatus::Confirmed => {
                info!(order_id = %order_id, "order already confirmed; confirmation is a no-op");
                return model_to_response(order);
            }
            OrderStatus::Pending => {}
            other => {
                return Err(ServiceError::ValidationError(format!(
                    "cannot confirm order in status {}",
                    other
                )));
            }
        }

        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.status = Set(OrderStatus::Confirmed.to_string());
        active.provider_payment_id = Set(Some(provider_payment_id.to_string()));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to confirm order");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "order confirmed");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderConfirmed {
                    order_id,
                    payment_id: provider_payment_id.to_string(),
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "failed to send order confirmed event");
            }
        }

        model_to_response(updated)
    }

    /// Records the provider order id minted for this intent during
    /// checkout. Never changes status.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn attach_provider_order(
        &self,
        order_id: Uuid,
        provider_order_id: &str,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.provider_order_id = Set(Some(provider_order_id.to_string()));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        active.update(db).await?;

        Ok(())
    }

    /// Marks pending orders older than the cutoff as abandoned and
    /// returns how many were swept. Reconciliation for checkouts whose
    /// hosted payment UI was dismissed and never retried.
    #[instrument(skip(self))]
    pub async fn sweep_abandoned(&self, older_than: Duration) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        let cutoff = Utc::now() - older_than;

        let stale = OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
            .filter(order::Column::CreatedAt.lt(cutoff))
            .all(db)
            .await?;

        let mut swept = 0u64;
        for order in stale {
            let order_id = order.id;
            let version = order.version;
            let mut active: OrderActiveModel = order.into();
            active.status = Set(OrderStatus::Abandoned.to_string());
            active.updated_at = Set(Some(Utc::now()));
            active.version = Set(version + 1);

            if let Err(e) = active.update(db).await {
                warn!(error = %e, order_id = %order_id, "failed to sweep stale order");
                continue;
            }
            swept += 1;

            if let Some(event_sender) = &self.event_sender {
                if let Err(e) = event_sender.send(Event::OrderAbandoned(order_id)).await {
                    warn!(error = %e, order_id = %order_id, "failed to send order abandoned event");
                }
            }
        }

        if swept > 0 {
            info!(swept, "abandoned order sweep completed");
        }
        Ok(swept)
    }
}

fn generate_order_number(order_id: Uuid) -> String {
    let simple = order_id.simple().to_string();
    format!("ORD-{}", &simple[..12].to_uppercase())
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::InternalError(format!("invalid stored order status: {}", raw)))
}

fn model_to_response(model: OrderModel) -> Result<OrderIntentResponse, ServiceError> {
    let status = parse_status(&model.status)?;
    let line_items: Vec<LineItem> = serde_json::from_value(model.line_items)
        .map_err(|e| ServiceError::SerializationError(format!("invalid line items: {}", e)))?;
    let shipping_address = model
        .shipping_address
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ServiceError::SerializationError(format!("invalid shipping address: {}", e)))?;

    Ok(OrderIntentResponse {
        id: model.id,
        order_number: model.order_number,
        customer_id: model.customer_id,
        status,
        currency: model.currency,
        total_minor: model.total_minor,
        line_items,
        shipping_address,
        provider_order_id: model.provider_order_id,
        provider_payment_id: model.provider_payment_id,
        notes: model.notes,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    })
}
