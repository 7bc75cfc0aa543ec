//! IVA (value-added tax) positions of an operation.
//!
//! Sales-side IVA is levied on the margin (sale minus operator cost), not on
//! the gross sale. Purchase-side IVA is backed out of a VAT-inclusive
//! operator cost. Both are stored one-to-one with the operation.

pub mod calculator;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod calculator_props;

pub use calculator::{
    IVA_RATE, PurchaseIva, SaleIva, cost_in_sale_currency, purchase_iva, sale_iva,
};
pub use error::IvaError;
pub use service::{IvaService, IvaStore};
pub use types::{IvaPurchaseRecord, IvaSaleRecord, SaleIvaInput};
