//! Currency-normalized ledger.
//!
//! This module implements:
//! - Movement types and the recorder, the single writer of movements
//! - Cash-box deltas kept in lockstep with inserts and deletes
//! - Balance projection and cash-box reconciliation
//! - The storage port implemented by `tesoro-db`

pub mod balance;
pub mod error;
pub mod recorder;
pub mod store;
pub mod types;

#[cfg(test)]
mod balance_props;

pub use balance::{
    Balance, BalanceProjector, BalanceTarget, ReconciliationReport, cash_box_delta, project,
};
pub use error::LedgerError;
pub use recorder::{LedgerService, NormalizedAmount, normalize_amount};
pub use store::LedgerStore;
pub use types::{
    CashBox, CashBoxDelta, Direction, FinancialAccount, LedgerMovement, MovementType,
    PaymentMethod, RecordMovementInput,
};
