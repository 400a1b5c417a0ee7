// Transfer reconciliation engine
pub mod reconciliation;
pub mod stock_transfers;
pub mod transfer_command;

// Storage accessors used inside the engine's transactions
pub mod stock_ledger;
pub mod transfer_journal;
