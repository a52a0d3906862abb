pub mod customers;
pub mod dispatch_ledger;
pub mod orders;

pub use customers::PostgresCustomerStore;
pub use dispatch_ledger::PostgresDispatchLedger;
pub use orders::PostgresOrderStore;
