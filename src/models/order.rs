use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;

/// Lifecycle of an order intent.
///
/// The payment subsystem performs exactly one transition,
/// `Pending -> Confirmed`; the abandoned-order sweep performs
/// `Pending -> Abandoned`. Everything else is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
    Failed,
    Abandoned,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// A purchasable line on an order intent.
///
/// Stored as a tagged JSON document so the two shapes the storefront
/// sells (single products and fixed combos) stay explicit instead of
/// an untyped map. Validated at the store boundary before any row is
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineItem {
    Simple {
        product_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<String>,
        quantity: u32,
        unit_price_minor: i64,
    },
    Combo {
        combo_id: Uuid,
        quantity: u32,
        unit_price_minor: i64,
        selected_items: Vec<ComboSelection>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ComboSelection {
    pub product_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl LineItem {
    pub fn quantity(&self) -> u32 {
        match self {
            LineItem::Simple { quantity, .. } | LineItem::Combo { quantity, .. } => *quantity,
        }
    }

    pub fn unit_price_minor(&self) -> i64 {
        match self {
            LineItem::Simple {
                unit_price_minor, ..
            }
            | LineItem::Combo {
                unit_price_minor, ..
            } => *unit_price_minor,
        }
    }

    pub fn line_total_minor(&self) -> i64 {
        self.unit_price_minor() * i64::from(self.quantity())
    }

    /// Boundary validation: quantities are at least one, prices are
    /// non-negative, combos select something.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.quantity() == 0 {
            return Err(ServiceError::ValidationError(
                "line item quantity must be at least 1".to_string(),
            ));
        }
        if self.unit_price_minor() < 0 {
            return Err(ServiceError::ValidationError(
                "line item unit price must not be negative".to_string(),
            ));
        }
        if let LineItem::Combo { selected_items, .. } = self {
            if selected_items.is_empty() {
                return Err(ServiceError::ValidationError(
                    "combo line item must select at least one item".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Shipping address snapshot captured on the order intent. Frozen at
/// creation; the payment handlers never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 2))]
    pub country: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
            OrderStatus::Abandoned,
        ] {
            let s = status.to_string();
            let parsed: OrderStatus = s.parse().expect("status should parse back");
            assert_eq!(parsed, status);
        }
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert!(OrderStatus::Confirmed.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn line_item_tagged_serde_round_trip() {
        let simple = LineItem::Simple {
            product_id: Uuid::new_v4(),
            size: Some("M".to_string()),
            quantity: 2,
            unit_price_minor: 49900,
        };
        let json = serde_json::to_value(&simple).unwrap();
        assert_eq!(json["type"], "simple");
        let back: LineItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, simple);

        let combo = LineItem::Combo {
            combo_id: Uuid::new_v4(),
            quantity: 1,
            unit_price_minor: 99900,
            selected_items: vec![ComboSelection {
                product_id: Uuid::new_v4(),
                size: None,
            }],
        };
        let json = serde_json::to_value(&combo).unwrap();
        assert_eq!(json["type"], "combo");
        let back: LineItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, combo);
    }

    #[test]
    fn line_item_boundary_validation() {
        let zero_qty = LineItem::Simple {
            product_id: Uuid::new_v4(),
            size: None,
            quantity: 0,
            unit_price_minor: 100,
        };
        assert!(zero_qty.validate().is_err());

        let negative_price = LineItem::Simple {
            product_id: Uuid::new_v4(),
            size: None,
            quantity: 1,
            unit_price_minor: -1,
        };
        assert!(negative_price.validate().is_err());

        let empty_combo = LineItem::Combo {
            combo_id: Uuid::new_v4(),
            quantity: 1,
            unit_price_minor: 100,
            selected_items: vec![],
        };
        assert!(empty_combo.validate().is_err());
    }

    #[test]
    fn line_total_multiplies_quantity() {
        let item = LineItem::Simple {
            product_id: Uuid::new_v4(),
            size: None,
            quantity: 3,
            unit_price_minor: 49950,
        };
        assert_eq!(item.line_total_minor(), 149_850);
    }
}
