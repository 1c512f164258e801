//! Purchase command handlers.

mod execute_purchase;

pub use execute_purchase::{ExecutePurchaseCommand, ExecutePurchaseHandler, PurchaseOutcome};
