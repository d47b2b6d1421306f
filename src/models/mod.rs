pub mod order;

pub use order::{ComboSelection, LineItem, OrderStatus, ShippingAddress};
