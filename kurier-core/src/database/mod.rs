//! Store ports and their Postgres and in-memory implementations.

pub mod memory;
pub mod ports;
pub mod postgres;
pub mod repositories;

pub use ports::customers::CustomerStore;
pub use ports::dispatch_ledger::DispatchLedger;
pub use ports::orders::{OrderFilter, OrderStore, TransitionUpdate};
pub use postgres::PostgresDatabase;
