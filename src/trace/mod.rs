//! Readers for the trace formats consumed by the benchmark driver.

mod oracle;
mod transactions;

pub use oracle::{OracleTrace, Request};
pub use transactions::{Transaction, TransactionTrace};
