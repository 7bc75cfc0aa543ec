//! Exchange rate types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stored USD→ARS rate (1 USD = `rate` ARS) effective on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Date this rate is effective.
    pub effective_date: NaiveDate,
    /// ARS per 1 USD.
    pub rate: Decimal,
}

impl ExchangeRate {
    /// Creates a new exchange rate.
    #[must_use]
    pub const fn new(effective_date: NaiveDate, rate: Decimal) -> Self {
        Self {
            effective_date,
            rate,
        }
    }
}

/// How a resolved rate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// A rate stored for exactly the requested date.
    Exact,
    /// The most recent rate before the requested date.
    OnOrBefore,
    /// Nothing on or before the date; the latest rate known today.
    LatestKnown,
    /// No stored rate at all; the configured constant.
    Fallback,
}

impl RateSource {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::OnOrBefore => "on_or_before",
            Self::LatestKnown => "latest_known",
            Self::Fallback => "fallback",
        }
    }

    /// Returns true when the rate did not come from stored data.
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Fallback)
    }
}

/// Result of resolving a rate for a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    /// ARS per 1 USD.
    pub rate: Decimal,
    /// Effective date of the stored rate (`None` for the fallback constant).
    pub effective_date: Option<NaiveDate>,
    /// Provenance of the rate.
    pub source: RateSource,
}

impl ResolvedRate {
    /// Returns true when the rate is the last-resort constant.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.source.is_degraded()
    }
}
