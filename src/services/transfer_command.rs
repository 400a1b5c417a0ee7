//! Coercion of loosely-typed transfer requests into validated commands.
//!
//! Back-office forms post ids and quantities as JSON numbers or as numeric
//! strings. Everything is parsed and checked here, before a transaction is
//! opened; the engine only ever sees a [`TransferCommand`].

use crate::config::AppConfig;
use crate::entities::product_transfer::TransferStatus;
use crate::errors::ServiceError;
use crate::services::reconciliation::{LedgerKey, TransferEffect};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;
use utoipa::ToSchema;
use validator::Validate;

/// Most decimal places a quantity may carry; matches the ledger column scale.
const QUANTITY_SCALE: u32 = 4;

/// A form field that may arrive as a JSON number or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Number(serde_json::Number),
    Text(String),
}

impl FormValue {
    fn as_text(&self) -> String {
        match self {
            FormValue::Number(n) => n.to_string(),
            FormValue::Text(s) => s.trim().to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, FormValue::Text(s) if s.trim().is_empty())
    }
}

impl From<i32> for FormValue {
    fn from(value: i32) -> Self {
        FormValue::Number(value.into())
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

/// Body of `POST /stock-transfers-product/create`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct TransferRequest {
    #[schema(value_type = Option<i32>, example = 1)]
    pub station_from: Option<FormValue>,
    #[schema(value_type = Option<i32>, example = 2)]
    pub station_to: Option<FormValue>,
    #[schema(value_type = Option<i32>, example = 1)]
    pub product_id: Option<FormValue>,
    /// Required when `station_from == station_to`
    #[schema(value_type = Option<i32>)]
    pub product_to: Option<FormValue>,
    #[schema(value_type = Option<String>, example = "30.5")]
    pub transfer_quantity: Option<FormValue>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
    /// pending | in_transit | completed
    #[schema(example = "pending")]
    pub status: Option<String>,
}

/// Body of `PUT /stock-transfers-product/edit`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct EditTransferRequest {
    #[schema(value_type = Option<i32>, example = 7)]
    pub id: Option<FormValue>,
    #[schema(value_type = Option<i32>, example = 1)]
    pub station_from: Option<FormValue>,
    #[schema(value_type = Option<i32>, example = 2)]
    pub station_to: Option<FormValue>,
    #[schema(value_type = Option<i32>, example = 1)]
    pub product_id: Option<FormValue>,
    #[schema(value_type = Option<i32>)]
    pub product_to: Option<FormValue>,
    #[schema(value_type = Option<String>, example = "50")]
    pub transfer_quantity: Option<FormValue>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
    #[schema(example = "in_transit")]
    pub status: Option<String>,
}

impl EditTransferRequest {
    /// Splits the request into the transfer id and the replacement fields.
    pub fn into_parts(self) -> Result<(i32, TransferRequest), ServiceError> {
        self.validate()?;
        let id = parse_id("id", required("id", self.id)?)?;
        Ok((
            id,
            TransferRequest {
                station_from: self.station_from,
                station_to: self.station_to,
                product_id: self.product_id,
                product_to: self.product_to,
                transfer_quantity: self.transfer_quantity,
                remarks: self.remarks,
                status: self.status,
            },
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// One product moves between two stations.
    CrossStation,
    /// Stock of one product becomes stock of another at the same station.
    SameStation { product_to: i32 },
}

/// A fully validated transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferCommand {
    pub station_from: i32,
    pub station_to: i32,
    pub product_id: i32,
    pub kind: TransferKind,
    pub quantity: Decimal,
    pub remarks: Option<String>,
    /// `None` when the caller did not name a status.
    pub status: Option<TransferStatus>,
}

impl TransferCommand {
    pub fn product_to(&self) -> Option<i32> {
        match self.kind {
            TransferKind::CrossStation => None,
            TransferKind::SameStation { product_to } => Some(product_to),
        }
    }

    pub fn effect(&self) -> TransferEffect {
        let destination = match self.kind {
            TransferKind::CrossStation => LedgerKey::new(self.station_to, self.product_id),
            TransferKind::SameStation { product_to } => LedgerKey::new(self.station_to, product_to),
        };
        TransferEffect {
            source: LedgerKey::new(self.station_from, self.product_id),
            destination,
            quantity: self.quantity,
        }
    }
}

/// Business rules applied while building a [`TransferCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRules {
    /// The only products that may be exchanged within one station, in either direction.
    pub same_station_pair: (i32, i32),
}

impl Default for TransferRules {
    fn default() -> Self {
        Self {
            same_station_pair: (2, 3),
        }
    }
}

impl From<&AppConfig> for TransferRules {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            same_station_pair: cfg.same_station_pair(),
        }
    }
}

impl TransferRules {
    fn allows_same_station(&self, from: i32, to: i32) -> bool {
        let (a, b) = self.same_station_pair;
        (from == a && to == b) || (from == b && to == a)
    }
}

fn required(field: &str, value: Option<FormValue>) -> Result<FormValue, ServiceError> {
    match value {
        Some(v) if !v.is_blank() => Ok(v),
        _ => Err(ServiceError::ValidationError(format!(
            "missing required field: {}",
            field
        ))),
    }
}

fn parse_id(field: &str, value: FormValue) -> Result<i32, ServiceError> {
    let text = value.as_text();
    match text.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ServiceError::ValidationError(format!(
            "invalid {}: {}",
            field, text
        ))),
    }
}

fn parse_quantity(value: FormValue) -> Result<Decimal, ServiceError> {
    let text = value.as_text();
    let invalid = || ServiceError::ValidationError(format!("invalid quantity: {}", text));

    let quantity = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| invalid())?
        .normalize();

    if quantity <= Decimal::ZERO || quantity.scale() > QUANTITY_SCALE {
        return Err(invalid());
    }
    Ok(quantity)
}

fn parse_status(value: Option<String>) -> Result<Option<TransferStatus>, ServiceError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => TransferStatus::from_str(raw)
            .map(Some)
            .map_err(|_| ServiceError::ValidationError(format!("invalid status: {}", raw))),
    }
}

impl TransferRequest {
    /// Validates and coerces the request. Fails fast on the first problem.
    pub fn into_command(self, rules: &TransferRules) -> Result<TransferCommand, ServiceError> {
        self.validate()?;

        let station_from = required("station_from", self.station_from)?;
        let station_to = required("station_to", self.station_to)?;
        let product_id = required("product_id", self.product_id)?;
        let quantity = required("transfer_quantity", self.transfer_quantity)?;

        let station_from = parse_id("station_from", station_from)?;
        let station_to = parse_id("station_to", station_to)?;
        let product_id = parse_id("product_id", product_id)?;
        let quantity = parse_quantity(quantity)?;

        let product_to = match self.product_to {
            Some(v) if !v.is_blank() => Some(parse_id("product_to", v)?),
            _ => None,
        };

        let kind = if station_from == station_to {
            let product_to = product_to.ok_or_else(|| {
                ServiceError::ValidationError(
                    "product_to is required for same-station transfers".to_string(),
                )
            })?;
            if product_to == product_id {
                return Err(ServiceError::ValidationError(
                    "product_to must differ from product_id".to_string(),
                ));
            }
            if !rules.allows_same_station(product_id, product_to) {
                return Err(ServiceError::ValidationError(format!(
                    "unsupported same-station product pair: {} -> {}",
                    product_id, product_to
                )));
            }
            TransferKind::SameStation { product_to }
        } else {
            if let Some(ignored) = product_to {
                debug!(product_to = ignored, "ignoring product_to on cross-station transfer");
            }
            TransferKind::CrossStation
        };

        let remarks = self
            .remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(TransferCommand {
            station_from,
            station_to,
            product_id,
            kind,
            quantity,
            remarks,
            status: parse_status(self.status)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn request(from: i32, to: i32, product: i32, qty: &str) -> TransferRequest {
        TransferRequest {
            station_from: Some(from.into()),
            station_to: Some(to.into()),
            product_id: Some(product.into()),
            transfer_quantity: Some(qty.into()),
            ..Default::default()
        }
    }

    #[test]
    fn cross_station_request_becomes_command() {
        let cmd = request(1, 2, 1, "30")
            .into_command(&TransferRules::default())
            .unwrap();

        assert_eq!(cmd.kind, TransferKind::CrossStation);
        assert_eq!(cmd.quantity, dec!(30));
        assert_eq!(cmd.status, None);
        let effect = cmd.effect();
        assert_eq!(effect.source, LedgerKey::new(1, 1));
        assert_eq!(effect.destination, LedgerKey::new(2, 1));
    }

    #[test]
    fn accepts_numeric_strings_and_json_numbers() {
        let body = serde_json::json!({
            "station_from": "4",
            "station_to": 5,
            "product_id": " 1 ",
            "transfer_quantity": 12.25,
            "status": "In_Transit"
        });
        let req: TransferRequest = serde_json::from_value(body).unwrap();
        let cmd = req.into_command(&TransferRules::default()).unwrap();

        assert_eq!((cmd.station_from, cmd.station_to, cmd.product_id), (4, 5, 1));
        assert_eq!(cmd.quantity, dec!(12.25));
        assert_eq!(cmd.status, Some(TransferStatus::InTransit));
    }

    #[test]
    fn same_station_requires_product_to() {
        let err = request(3, 3, 2, "10")
            .into_command(&TransferRules::default())
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("product_to"));
    }

    #[rstest]
    #[case(2, 3, true)]
    #[case(3, 2, true)]
    #[case(1, 3, false)]
    #[case(2, 4, false)]
    fn same_station_is_limited_to_the_configured_pair(
        #[case] product_id: i32,
        #[case] product_to: i32,
        #[case] allowed: bool,
    ) {
        let mut req = request(3, 3, product_id, "10");
        req.product_to = Some(product_to.into());
        let result = req.into_command(&TransferRules::default());
        if allowed {
            assert_eq!(
                result.unwrap().kind,
                TransferKind::SameStation { product_to }
            );
        } else {
            assert_matches!(result, Err(ServiceError::ValidationError(_)));
        }
    }

    #[rstest]
    #[case("0")]
    #[case("-5")]
    #[case("abc")]
    #[case("NaN")]
    #[case("1.00001")]
    fn rejects_invalid_quantities(#[case] qty: &str) {
        let result = request(1, 2, 1, qty).into_command(&TransferRules::default());
        assert_matches!(result, Err(ServiceError::ValidationError(msg)) if msg.contains("invalid quantity"));
    }

    #[test]
    fn missing_fields_are_reported_by_name() {
        let mut req = request(1, 2, 1, "5");
        req.station_to = Some("  ".into());
        assert_matches!(
            req.into_command(&TransferRules::default()),
            Err(ServiceError::ValidationError(msg)) if msg == "missing required field: station_to"
        );
    }

    #[test]
    fn rejects_unknown_status_and_long_remarks() {
        let mut req = request(1, 2, 1, "5");
        req.status = Some("shipped".into());
        assert_matches!(
            req.into_command(&TransferRules::default()),
            Err(ServiceError::ValidationError(_))
        );

        let mut req = request(1, 2, 1, "5");
        req.remarks = Some("x".repeat(501));
        assert_matches!(
            req.into_command(&TransferRules::default()),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn edit_request_requires_id() {
        let body = serde_json::json!({ "station_from": 1, "station_to": 2, "product_id": 1, "transfer_quantity": 5 });
        let req: EditTransferRequest = serde_json::from_value(body).unwrap();
        assert_matches!(req.into_parts(), Err(ServiceError::ValidationError(_)));
    }
}
