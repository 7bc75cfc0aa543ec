//! USD↔ARS exchange rates and conversion.
//!
//! Every ledger movement is normalized to the base currency (ARS). Rates are
//! quoted as "ARS per 1 USD" and resolved per date through
//! [`ExchangeRateResolver`], which falls back to older rates and finally to
//! a configured constant in a loudly logged degraded mode.

pub mod conversion;
pub mod error;
pub mod exchange;
pub mod resolver;

#[cfg(test)]
mod props;

pub use conversion::{convert_between, convert_to_base, round_money};
pub use error::CurrencyError;
pub use exchange::{ExchangeRate, RateSource, ResolvedRate};
pub use resolver::{ExchangeRateResolver, ExchangeRateStore};
