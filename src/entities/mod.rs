// Stations and products are reference data owned by the wider back-office.
pub mod product;
pub mod station;

// Stock ledger, movement journal and transfer orders
pub mod filling_history;
pub mod product_transfer;
pub mod station_stock;

pub mod audit_log;
