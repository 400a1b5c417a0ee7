use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FuelOps API",
        version = "1.0.0",
        description = r#"
# FuelOps Stock Transfer API

Back-office API for moving fuel and oil stock between filling stations.

Every transfer debits the source station's ledger row, credits the
destination row and writes one journal entry per movement, all in one
database transaction. Editing a transfer reverses its previous effect and
applies the new one.

## Identity

The gateway in front of this service forwards the acting user as
`x-user-id` and `x-user-name` headers. Requests without them are recorded
as anonymous.

## Error Handling

```json
{
  "error": "insufficient_stock",
  "message": "Insufficient stock at station 1 for product 1: available 20, required 30",
  "request_id": "2f6c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "stock-transfers", description = "Stock transfer endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::stock_transfers::get_form_lookups,
        crate::handlers::stock_transfers::create_transfer,
        crate::handlers::stock_transfers::get_transfer,
        crate::handlers::stock_transfers::edit_transfer,
        crate::handlers::stock_transfers::get_stock_level,
        crate::handlers::stock_transfers::get_transfer_history,

        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            // Requests
            crate::services::transfer_command::TransferRequest,
            crate::services::transfer_command::EditTransferRequest,

            // Responses
            crate::handlers::stock_transfers::CreateTransferResponse,
            crate::handlers::stock_transfers::EditTransferResponse,
            crate::handlers::stock_transfers::TransferEnvelope,
            crate::handlers::stock_transfers::StockEnvelope,
            crate::handlers::stock_transfers::HistoryEnvelope,
            crate::services::stock_transfers::TransferFormLookups,
            crate::services::stock_transfers::StationOption,
            crate::services::stock_transfers::ProductOption,
            crate::services::stock_transfers::TransferDetails,
            crate::services::stock_transfers::StockLevelView,
            crate::services::stock_transfers::JournalEntryView,
            crate::entities::product_transfer::TransferStatus,
            crate::entities::filling_history::TransType,
            crate::handlers::health::ReadinessResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_transfer_endpoints() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("FuelOps API"));
        assert!(json.contains("/api/v1/stock-transfers-product/create"));
        assert!(json.contains("/api/v1/stock-transfers-product/edit"));
        assert!(json.contains("ErrorResponse"));
    }
}
