use crate::auth::Actor;
use crate::errors::ServiceError;
use crate::services::stock_transfers::{
    JournalEntryView, StockLevelView, StockTransferService, TransferDetails, TransferFormLookups,
};
use crate::services::transfer_command::{EditTransferRequest, TransferRequest};
use axum::{
    extract::{rejection::JsonRejection, Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Trait for handler state that provides access to the transfer engine
pub trait StockTransferHandlerState: Clone + Send + Sync + 'static {
    fn stock_transfer_service(&self) -> &StockTransferService;
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateTransferResponse {
    pub success: bool,
    #[serde(rename = "transferId")]
    pub transfer_id: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EditTransferResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferEnvelope {
    pub transfer: TransferDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockEnvelope {
    pub stock: StockLevelView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEnvelope {
    pub entries: Vec<JournalEntryView>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TransferIdQuery {
    /// Transfer id
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StockQuery {
    pub station_id: Option<String>,
    pub product_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub transfer_id: Option<String>,
}

fn query_id(name: &str, raw: Option<&str>) -> Result<i32, ServiceError> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| {
        ServiceError::ValidationError(format!("missing required field: {}", name))
    })?;
    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ServiceError::ValidationError(format!(
            "invalid {}: {}",
            name, raw
        ))),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))
}

/// Creates the stock transfer router
pub fn stock_transfer_routes<S>() -> Router<S>
where
    S: StockTransferHandlerState,
{
    Router::new()
        .route(
            "/create",
            get(get_form_lookups::<S>).post(create_transfer::<S>),
        )
        .route("/edit", get(get_transfer::<S>).put(edit_transfer::<S>))
        .route("/stock", get(get_stock_level::<S>))
        .route("/history", get(get_transfer_history::<S>))
}

/// Stations and products for the transfer form
#[utoipa::path(
    get,
    path = "/api/v1/stock-transfers-product/create",
    responses(
        (status = 200, description = "Form lookups returned", body = TransferFormLookups),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-transfers"
)]
pub async fn get_form_lookups<S>(
    State(state): State<S>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTransferHandlerState,
{
    let lookups = state.stock_transfer_service().form_lookups().await?;
    Ok(Json(lookups))
}

/// Create a stock transfer
#[utoipa::path(
    post,
    path = "/api/v1/stock-transfers-product/create",
    request_body = TransferRequest,
    responses(
        (status = 201, description = "Transfer created", body = CreateTransferResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "No stock at source", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Transaction failed", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-transfers"
)]
pub async fn create_transfer<S>(
    State(state): State<S>,
    actor: Actor,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTransferHandlerState,
{
    let service = state.stock_transfer_service();
    let command = json_body(body)?.into_command(service.rules())?;
    let record = service.create_transfer(command, &actor).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTransferResponse {
            success: true,
            transfer_id: record.id,
        }),
    ))
}

/// Fetch one transfer with station and product names
#[utoipa::path(
    get,
    path = "/api/v1/stock-transfers-product/edit",
    params(TransferIdQuery),
    responses(
        (status = 200, description = "Transfer returned", body = TransferEnvelope),
        (status = 400, description = "Invalid id", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-transfers"
)]
pub async fn get_transfer<S>(
    State(state): State<S>,
    Query(query): Query<TransferIdQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTransferHandlerState,
{
    let id = query_id("id", query.id.as_deref())?;
    let transfer = state.stock_transfer_service().get_transfer(id).await?;
    Ok(Json(TransferEnvelope { transfer }))
}

/// Replace a stock transfer, re-reconciling the ledger
#[utoipa::path(
    put,
    path = "/api/v1/stock-transfers-product/edit",
    request_body = EditTransferRequest,
    responses(
        (status = 200, description = "Transfer updated", body = EditTransferResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer or source stock not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Transaction failed", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-transfers"
)]
pub async fn edit_transfer<S>(
    State(state): State<S>,
    actor: Actor,
    body: Result<Json<EditTransferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTransferHandlerState,
{
    let service = state.stock_transfer_service();
    let (id, request) = json_body(body)?.into_parts()?;
    let command = request.into_command(service.rules())?;
    service.edit_transfer(id, command, &actor).await?;

    Ok(Json(EditTransferResponse { success: true }))
}

/// Current stock of one product at one station
#[utoipa::path(
    get,
    path = "/api/v1/stock-transfers-product/stock",
    params(StockQuery),
    responses(
        (status = 200, description = "Stock level returned", body = StockEnvelope),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse),
        (status = 404, description = "No stock row", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-transfers"
)]
pub async fn get_stock_level<S>(
    State(state): State<S>,
    Query(query): Query<StockQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTransferHandlerState,
{
    let station_id = query_id("station_id", query.station_id.as_deref())?;
    let product_id = query_id("product_id", query.product_id.as_deref())?;
    let stock = state
        .stock_transfer_service()
        .stock_level(station_id, product_id)
        .await?;
    Ok(Json(StockEnvelope { stock }))
}

/// Journal entries written for one transfer, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/stock-transfers-product/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Journal entries returned", body = HistoryEnvelope),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-transfers"
)]
pub async fn get_transfer_history<S>(
    State(state): State<S>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTransferHandlerState,
{
    let transfer_id = query_id("transfer_id", query.transfer_id.as_deref())?;
    let entries = state.stock_transfer_service().history(transfer_id).await?;
    Ok(Json(HistoryEnvelope { entries }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn query_id_requires_positive_integer() {
        assert_eq!(query_id("id", Some(" 12 ")).unwrap(), 12);
        assert_matches!(query_id("id", None), Err(ServiceError::ValidationError(_)));
        assert_matches!(query_id("id", Some("0")), Err(ServiceError::ValidationError(_)));
        assert_matches!(query_id("id", Some("x1")), Err(ServiceError::ValidationError(_)));
    }
}
