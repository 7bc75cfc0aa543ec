//! Exchange rate resolution with a fallback chain.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tesoro_shared::AppResult;
use tracing::{debug, warn};

use super::error::CurrencyError;
use super::exchange::{ExchangeRate, RateSource, ResolvedRate};

/// Storage of daily USD→ARS rates.
#[async_trait]
pub trait ExchangeRateStore: Send + Sync {
    /// Returns the most recent rate effective on or before `date`.
    async fn latest_on_or_before(&self, date: NaiveDate) -> AppResult<Option<ExchangeRate>>;

    /// Inserts or replaces the rate for its effective date.
    async fn upsert_rate(&self, rate: ExchangeRate) -> AppResult<ExchangeRate>;
}

/// Resolves the USD→ARS rate for a date.
///
/// Policy, in order:
/// 1. the rate stored for the date, or the most recent one before it;
/// 2. the latest rate known today, even if it is after the date;
/// 3. the configured last-resort constant (degraded mode).
///
/// Every use of the constant is logged under the `tesoro::degraded` target and
/// counted; see [`ExchangeRateResolver::fallback_count`].
pub struct ExchangeRateResolver {
    store: Arc<dyn ExchangeRateStore>,
    fallback_rate: Option<Decimal>,
    fallback_hits: AtomicU64,
}

impl ExchangeRateResolver {
    /// Creates a resolver over `store`. `fallback_rate = None` disables degraded mode.
    #[must_use]
    pub fn new(store: Arc<dyn ExchangeRateStore>, fallback_rate: Option<Decimal>) -> Self {
        Self {
            store,
            fallback_rate,
            fallback_hits: AtomicU64::new(0),
        }
    }

    /// Number of lookups answered by the last-resort constant since start-up.
    #[must_use]
    pub fn fallback_count(&self) -> u64 {
        self.fallback_hits.load(Ordering::Relaxed)
    }

    /// Resolves the rate for `date`, allowing the degraded fallback.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::NotFound` if nothing is stored and no fallback
    /// is configured.
    pub async fn resolve(&self, date: NaiveDate) -> Result<ResolvedRate, CurrencyError> {
        self.resolve_at(date, Utc::now().date_naive()).await
    }

    /// Resolves the rate for `date` as seen on `today`.
    ///
    /// # Errors
    ///
    /// See [`ExchangeRateResolver::resolve`].
    pub async fn resolve_at(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<ResolvedRate, CurrencyError> {
        if let Some(found) = self.store.latest_on_or_before(date).await? {
            let source = if found.effective_date == date {
                RateSource::Exact
            } else {
                RateSource::OnOrBefore
            };
            return Ok(ResolvedRate {
                rate: found.rate,
                effective_date: Some(found.effective_date),
                source,
            });
        }

        if today > date
            && let Some(found) = self.store.latest_on_or_before(today).await?
        {
            debug!(%date, effective_date = %found.effective_date, "using latest known rate");
            return Ok(ResolvedRate {
                rate: found.rate,
                effective_date: Some(found.effective_date),
                source: RateSource::LatestKnown,
            });
        }

        match self.fallback_rate {
            Some(rate) => {
                self.fallback_hits.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "tesoro::degraded",
                    %date,
                    %rate,
                    "no stored USD/ARS rate, using fallback constant"
                );
                Ok(ResolvedRate {
                    rate,
                    effective_date: None,
                    source: RateSource::Fallback,
                })
            }
            None => Err(CurrencyError::NotFound(date)),
        }
    }

    /// Resolves the rate for `date`, refusing the degraded fallback.
    ///
    /// Used by write paths; the fallback still counts as a hit.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::DegradedOnly` when only the constant is
    /// available, or `CurrencyError::NotFound`.
    pub async fn resolve_strict(&self, date: NaiveDate) -> Result<ResolvedRate, CurrencyError> {
        let resolved = self.resolve(date).await?;
        if resolved.is_degraded() {
            return Err(CurrencyError::DegradedOnly {
                date,
                rate: resolved.rate,
            });
        }
        Ok(resolved)
    }

    /// Stores the rate for a date, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::NonPositiveRate` for zero or negative rates.
    pub async fn upsert_rate(
        &self,
        effective_date: NaiveDate,
        rate: Decimal,
    ) -> Result<ExchangeRate, CurrencyError> {
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::NonPositiveRate);
        }
        let stored = self
            .store
            .upsert_rate(ExchangeRate::new(effective_date, rate))
            .await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryExchangeRates;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn resolver_with(rates: &[(NaiveDate, Decimal)], fallback: Option<Decimal>) -> ExchangeRateResolver {
        let store = Arc::new(InMemoryExchangeRates::default());
        for (d, r) in rates {
            store.insert(ExchangeRate::new(*d, *r));
        }
        ExchangeRateResolver::new(store, fallback)
    }

    #[tokio::test]
    async fn test_exact_rate() {
        let resolver = resolver_with(&[(date(2025, 1, 15), dec!(1000))], Some(dec!(1)));
        let resolved = resolver
            .resolve_at(date(2025, 1, 15), date(2025, 2, 1))
            .await
            .unwrap();
        assert_eq!(resolved.rate, dec!(1000));
        assert_eq!(resolved.source, RateSource::Exact);
        assert_eq!(resolver.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_most_recent_before_date() {
        let resolver = resolver_with(
            &[(date(2025, 1, 10), dec!(990)), (date(2025, 1, 20), dec!(1010))],
            None,
        );
        let resolved = resolver
            .resolve_at(date(2025, 1, 15), date(2025, 2, 1))
            .await
            .unwrap();
        assert_eq!(resolved.rate, dec!(990));
        assert_eq!(resolved.effective_date, Some(date(2025, 1, 10)));
        assert_eq!(resolved.source, RateSource::OnOrBefore);
    }

    #[tokio::test]
    async fn test_latest_known_when_nothing_before_date() {
        let resolver = resolver_with(&[(date(2025, 3, 1), dec!(1100))], None);
        let resolved = resolver
            .resolve_at(date(2025, 1, 1), date(2025, 4, 1))
            .await
            .unwrap();
        assert_eq!(resolved.rate, dec!(1100));
        assert_eq!(resolved.source, RateSource::LatestKnown);
    }

    #[tokio::test]
    async fn test_fallback_is_counted() {
        let resolver = resolver_with(&[], Some(dec!(1000)));
        let resolved = resolver
            .resolve_at(date(2025, 1, 1), date(2025, 4, 1))
            .await
            .unwrap();
        assert!(resolved.is_degraded());
        assert_eq!(resolved.rate, dec!(1000));
        assert_eq!(resolved.effective_date, None);
        assert_eq!(resolver.fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_not_found_without_fallback() {
        let resolver = resolver_with(&[], None);
        let err = resolver
            .resolve_at(date(2025, 1, 1), date(2025, 4, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CurrencyError::NotFound(_)));
        assert_eq!(resolver.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_rejects_fallback() {
        let resolver = resolver_with(&[], Some(dec!(1000)));
        let err = resolver.resolve_strict(date(2025, 1, 1)).await.unwrap_err();
        assert!(matches!(err, CurrencyError::DegradedOnly { .. }));
        assert_eq!(resolver.fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rate_replaces_same_date() {
        let resolver = resolver_with(&[], None);
        resolver.upsert_rate(date(2025, 1, 15), dec!(1000)).await.unwrap();
        resolver.upsert_rate(date(2025, 1, 15), dec!(1050)).await.unwrap();
        let resolved = resolver
            .resolve_at(date(2025, 1, 15), date(2025, 1, 15))
            .await
            .unwrap();
        assert_eq!(resolved.rate, dec!(1050));
    }

    #[tokio::test]
    async fn test_upsert_rejects_non_positive() {
        let resolver = resolver_with(&[], None);
        let err = resolver.upsert_rate(date(2025, 1, 15), dec!(0)).await.unwrap_err();
        assert!(matches!(err, CurrencyError::NonPositiveRate));
    }
}
