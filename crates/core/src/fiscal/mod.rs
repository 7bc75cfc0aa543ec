//! Fiscal invoice authorization.
//!
//! An invoice is authorized by asking the tax authority for the last voucher
//! number of its (point of sale, voucher type), submitting `last + 1` with the
//! full monetary breakdown, and interpreting the answer. The read-then-submit
//! sequence is serialized per (agency, point of sale, voucher type).

pub mod authorizer;
pub mod breakdown;
pub mod bridge;
pub mod error;
pub mod lock;
pub mod settings;
pub mod types;

pub use authorizer::{InvoiceAuthorizer, InvoiceStore};
pub use breakdown::{build_voucher_request, currency_code, group_iva, iva_line, validate_totals};
pub use bridge::FiscalBridge;
pub use error::FiscalError;
pub use lock::{
    AllocationGuard, AllocationKey, AllocationLock, LayeredAllocationLock, LocalAllocationLocks,
};
pub use settings::{
    FiscalCredentials, FiscalEnvironment, FiscalSettings, FiscalSettingsStore, blocks_new_claim,
};
pub use types::{
    AuthorityMessage, AuthorityOutcome, AuthorityResponse, Concept, Invoice, InvoiceStatus,
    IvaAlicuota, IvaLine, IvaRateBucket, VoucherRequest, VoucherType,
};
