//! OpenAPI documentation, served through Swagger UI at `/swagger-ui`.

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    errors::ErrorResponse,
    handlers::{orders, payments},
    models::{ComboSelection, LineItem, OrderStatus, ShippingAddress},
    services::orders::{OrderIntentListResponse, OrderIntentResponse},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        payments::create_payment_order,
        payments::verify_payment,
        orders::create_order,
        orders::get_order,
        orders::list_orders,
    ),
    components(schemas(
        payments::CreatePaymentOrderRequest,
        payments::CreatePaymentOrderResponse,
        payments::VerifyPaymentRequest,
        payments::VerifyPaymentResponse,
        orders::CreateOrderRequest,
        OrderIntentResponse,
        OrderIntentListResponse,
        OrderStatus,
        LineItem,
        ComboSelection,
        ShippingAddress,
        ErrorResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "payments", description = "Payment order creation and callback verification"),
        (name = "orders", description = "Order intent lifecycle")
    ),
    info(
        title = "Storefront API",
        description = "Order intents and payment verification for the storefront"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_includes_payment_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.contains(&"/api/v1/payments/orders".to_string()));
        assert!(paths.contains(&"/api/v1/payments/verify".to_string()));
        assert!(paths.contains(&"/api/v1/orders".to_string()));
    }
}
