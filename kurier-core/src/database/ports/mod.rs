pub mod customers;
pub mod dispatch_ledger;
pub mod orders;
