//! Financial side effects of an operation (a sale).
//!
//! Saving an operation's amounts is the primary mutation. IVA records, the
//! operator payable and the KPI signal follow as independent post-commit
//! tasks: each runs in its own error boundary and a failing task never rolls
//! back the primary write. The caller gets a [`FanOutReport`] saying which
//! tasks failed.

pub mod fanout;
pub mod payments;
pub mod service;
pub mod types;

pub use fanout::{FailedTask, FanOut, FanOutReport};
pub use payments::{OperatorPaymentStore, PaymentSync, sync_operator_payment};
pub use service::{OperationDeletion, OperationFinancialsService, OperationStore};
pub use types::{OperationFinancials, OperatorPayment, OperatorPaymentStatus};
