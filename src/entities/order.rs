use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order intent row. Owned exclusively by this table; the payment
/// handlers mutate only `status` and `provider_payment_id`, never the
/// line items or total.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub order_number: String,

    pub customer_id: Uuid,
    pub status: String,
    pub currency: String,

    /// Monetary total in integer minor units (paise).
    pub total_minor: i64,

    /// Tagged-union line items document (`models::LineItem`).
    pub line_items: Json,

    /// Shipping address snapshot (`models::ShippingAddress`).
    pub shipping_address: Option<Json>,

    /// Gateway order id attached during checkout, if known.
    pub provider_order_id: Option<String>,

    /// Gateway payment id; null until the payment is verified.
    pub provider_payment_id: Option<String>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
