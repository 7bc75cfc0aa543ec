//! IVA persistence and orchestration.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tesoro_shared::AppResult;
use tesoro_shared::types::{AgencyId, Currency, OperationId};
use tracing::{debug, instrument};

use super::calculator::{cost_in_sale_currency, purchase_iva, sale_iva};
use super::error::IvaError;
use super::types::{IvaPurchaseRecord, IvaSaleRecord, SaleIvaInput};

/// Storage of IVA records, one per operation and side.
#[async_trait]
pub trait IvaStore: Send + Sync {
    /// Inserts or replaces the sales record of the operation.
    async fn upsert_sale(&self, record: &IvaSaleRecord) -> AppResult<()>;

    /// Inserts or replaces the purchase record of the operation.
    async fn upsert_purchase(&self, record: &IvaPurchaseRecord) -> AppResult<()>;

    /// Deletes the sales record. Returns false if there was none.
    async fn delete_sale(&self, agency_id: AgencyId, operation_id: OperationId) -> AppResult<bool>;

    /// Deletes the purchase record. Returns false if there was none.
    async fn delete_purchase(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<bool>;

    /// Finds the sales record.
    async fn find_sale(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<IvaSaleRecord>>;

    /// Finds the purchase record.
    async fn find_purchase(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<IvaPurchaseRecord>>;
}

/// Computes and stores IVA positions.
pub struct IvaService {
    store: Arc<dyn IvaStore>,
}

impl IvaService {
    /// Creates a new service.
    #[must_use]
    pub fn new(store: Arc<dyn IvaStore>) -> Self {
        Self { store }
    }

    /// Computes the sales-side position and stores it in place.
    ///
    /// # Errors
    ///
    /// Returns `IvaError::NegativeAmount`, `IvaError::MissingExchangeRate`
    /// or a storage failure.
    #[instrument(skip(self, input), fields(operation_id = %input.operation_id))]
    pub async fn upsert_sale_iva(&self, input: &SaleIvaInput) -> Result<IvaSaleRecord, IvaError> {
        if input.sale_amount < Decimal::ZERO || input.operator_cost < Decimal::ZERO {
            return Err(IvaError::NegativeAmount);
        }
        let cost = cost_in_sale_currency(
            input.operator_cost,
            input.operator_cost_currency,
            input.sale_currency,
            input.exchange_rate,
        )?;
        let position = sale_iva(input.sale_amount, cost);
        let record = IvaSaleRecord {
            operation_id: input.operation_id,
            agency_id: input.agency_id,
            sale_amount_total: input.sale_amount,
            operator_cost_total: cost,
            net_amount: position.net_amount,
            iva_amount: position.iva_amount,
            currency: input.sale_currency,
        };
        self.store.upsert_sale(&record).await?;
        debug!(iva = %record.iva_amount, net = %record.net_amount, "sale IVA stored");
        Ok(record)
    }

    /// Computes the purchase-side position and stores it in place.
    ///
    /// # Errors
    ///
    /// Returns `IvaError::NegativeAmount` or a storage failure.
    #[instrument(skip(self))]
    pub async fn upsert_purchase_iva(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
        operator_cost: Decimal,
        currency: Currency,
    ) -> Result<IvaPurchaseRecord, IvaError> {
        if operator_cost < Decimal::ZERO {
            return Err(IvaError::NegativeAmount);
        }
        let position = purchase_iva(operator_cost);
        let record = IvaPurchaseRecord {
            operation_id,
            agency_id,
            operator_cost_total: operator_cost,
            net_amount: position.net_amount,
            iva_amount: position.iva_amount,
            currency,
        };
        self.store.upsert_purchase(&record).await?;
        debug!(iva = %record.iva_amount, net = %record.net_amount, "purchase IVA stored");
        Ok(record)
    }

    /// Deletes the sales-side record.
    ///
    /// # Errors
    ///
    /// Returns a storage failure.
    pub async fn delete_sale_iva(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> Result<bool, IvaError> {
        Ok(self.store.delete_sale(agency_id, operation_id).await?)
    }

    /// Deletes the purchase-side record.
    ///
    /// # Errors
    ///
    /// Returns a storage failure.
    pub async fn delete_purchase_iva(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> Result<bool, IvaError> {
        Ok(self.store.delete_purchase(agency_id, operation_id).await?)
    }

    /// Both records of an operation.
    ///
    /// # Errors
    ///
    /// Returns a storage failure.
    pub async fn positions(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> Result<(Option<IvaSaleRecord>, Option<IvaPurchaseRecord>), IvaError> {
        let sale = self.store.find_sale(agency_id, operation_id).await?;
        let purchase = self.store.find_purchase(agency_id, operation_id).await?;
        Ok((sale, purchase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryIva;
    use rust_decimal_macros::dec;

    fn sale_input(agency_id: AgencyId, operation_id: OperationId) -> SaleIvaInput {
        SaleIvaInput {
            agency_id,
            operation_id,
            sale_amount: dec!(3000),
            sale_currency: Currency::Usd,
            operator_cost: dec!(2400),
            operator_cost_currency: Currency::Usd,
            exchange_rate: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_sale_iva_is_idempotent() {
        let store = Arc::new(InMemoryIva::default());
        let service = IvaService::new(store.clone());
        let agency = AgencyId::new();
        let operation = OperationId::new();

        let first = service.upsert_sale_iva(&sale_input(agency, operation)).await.unwrap();
        let second = service.upsert_sale_iva(&sale_input(agency, operation)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.sale_count(), 1);
        assert_eq!(first.iva_amount, dec!(126.00));
        assert_eq!(first.net_amount, dec!(474.00));
    }

    #[tokio::test]
    async fn test_upsert_sale_iva_updates_in_place() {
        let store = Arc::new(InMemoryIva::default());
        let service = IvaService::new(store.clone());
        let agency = AgencyId::new();
        let operation = OperationId::new();

        service.upsert_sale_iva(&sale_input(agency, operation)).await.unwrap();
        let mut changed = sale_input(agency, operation);
        changed.sale_amount = dec!(3400);
        let record = service.upsert_sale_iva(&changed).await.unwrap();

        assert_eq!(store.sale_count(), 1);
        assert_eq!(record.iva_amount, dec!(210.00));
        let (stored, _) = service.positions(agency, operation).await.unwrap();
        assert_eq!(stored.unwrap().sale_amount_total, dec!(3400));
    }

    #[tokio::test]
    async fn test_mixed_currency_without_rate_is_blocked() {
        let service = IvaService::new(Arc::new(InMemoryIva::default()));
        let mut input = sale_input(AgencyId::new(), OperationId::new());
        input.operator_cost_currency = Currency::Ars;
        let err = service.upsert_sale_iva(&input).await.unwrap_err();
        assert!(matches!(err, IvaError::MissingExchangeRate { .. }));
    }

    #[tokio::test]
    async fn test_purchase_iva_and_delete() {
        let store = Arc::new(InMemoryIva::default());
        let service = IvaService::new(store.clone());
        let agency = AgencyId::new();
        let operation = OperationId::new();

        let record = service
            .upsert_purchase_iva(agency, operation, dec!(2400), Currency::Usd)
            .await
            .unwrap();
        assert_eq!(record.iva_amount, dec!(416.53));
        assert_eq!(record.net_amount, dec!(1983.47));

        assert!(service.delete_purchase_iva(agency, operation).await.unwrap());
        assert!(!service.delete_purchase_iva(agency, operation).await.unwrap());
        assert!(!service.delete_sale_iva(agency, operation).await.unwrap());
    }
}
