//! Exchange rate repository.
//!
//! One USD→ARS rate per effective date; upserts replace the rate in place.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tesoro_core::currency::{ExchangeRate, ExchangeRateStore};
use tesoro_shared::AppResult;

use crate::entities::exchange_rates;
use crate::error::db_err;

/// Exchange rate repository.
#[derive(Debug, Clone)]
pub struct ExchangeRateRepository {
    db: DatabaseConnection,
}

impl ExchangeRateRepository {
    /// Creates a new exchange rate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists stored rates between two dates, newest first.
    pub async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<ExchangeRate>> {
        let rows = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::EffectiveDate.gte(from))
            .filter(exchange_rates::Column::EffectiveDate.lte(to))
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(to_domain).collect())
    }
}

fn to_domain(model: exchange_rates::Model) -> ExchangeRate {
    ExchangeRate::new(model.effective_date, model.rate)
}

#[async_trait]
impl ExchangeRateStore for ExchangeRateRepository {
    async fn latest_on_or_before(&self, date: NaiveDate) -> AppResult<Option<ExchangeRate>> {
        let row = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::EffectiveDate.lte(date))
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(to_domain))
    }

    async fn upsert_rate(&self, rate: ExchangeRate) -> AppResult<ExchangeRate> {
        let now = Utc::now().into();
        let model = exchange_rates::ActiveModel {
            effective_date: Set(rate.effective_date),
            rate: Set(rate.rate),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // created_at is kept on update
        exchange_rates::Entity::insert(model)
            .on_conflict(
                OnConflict::column(exchange_rates::Column::EffectiveDate)
                    .update_columns([
                        exchange_rates::Column::Rate,
                        exchange_rates::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        Ok(rate)
    }
}
