pub mod health;
pub mod stock_transfers;

pub use health::HealthHandlerState;
pub use stock_transfers::StockTransferHandlerState;
