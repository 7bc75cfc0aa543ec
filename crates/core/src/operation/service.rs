//! Operation financial sync and deletion.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tesoro_shared::types::{AgencyId, OperationId};
use tesoro_shared::{AppError, AppResult};
use tracing::{info, instrument, warn};

use super::fanout::{FanOut, FanOutReport};
use super::payments::{OperatorPaymentStore, sync_operator_payment};
use super::types::OperationFinancials;
use crate::iva::{IvaService, SaleIvaInput};
use crate::ledger::LedgerService;
use crate::signal::DashboardSignal;

/// Storage of the last saved financial snapshot of each operation.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Finds the snapshot.
    async fn find_financials(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<OperationFinancials>>;

    /// Inserts or replaces the snapshot.
    async fn save_financials(&self, financials: &OperationFinancials) -> AppResult<()>;

    /// Deletes the snapshot. Returns false if there was none.
    async fn delete_financials(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<bool>;
}

/// Result of deleting an operation's financials.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDeletion {
    /// Ledger movements removed.
    pub movements_deleted: usize,
    /// Secondary clean-up outcome.
    pub report: FanOutReport,
}

/// Keeps IVA records, operator payables and KPIs in step with an operation.
pub struct OperationFinancialsService {
    operations: Arc<dyn OperationStore>,
    iva: Arc<IvaService>,
    payments: Arc<dyn OperatorPaymentStore>,
    ledger: Arc<LedgerService>,
    signal: Arc<dyn DashboardSignal>,
}

impl OperationFinancialsService {
    /// Creates a new service.
    #[must_use]
    pub fn new(
        operations: Arc<dyn OperationStore>,
        iva: Arc<IvaService>,
        payments: Arc<dyn OperatorPaymentStore>,
        ledger: Arc<LedgerService>,
        signal: Arc<dyn DashboardSignal>,
    ) -> Self {
        Self {
            operations,
            iva,
            payments,
            ledger,
            signal,
        }
    }

    /// Saves the operation's amounts, then runs the side effects.
    ///
    /// # Errors
    ///
    /// Only validation and the primary save fail the call; side-effect
    /// failures are reported in the returned [`FanOutReport`].
    #[instrument(skip(self, current), fields(agency_id = %current.agency_id, operation_id = %current.operation_id))]
    pub async fn sync_operation_financials(
        &self,
        current: OperationFinancials,
    ) -> AppResult<FanOutReport> {
        if current.sale_amount < Decimal::ZERO || current.operator_cost < Decimal::ZERO {
            return Err(AppError::Validation(
                "sale amount and operator cost must not be negative".into(),
            ));
        }

        let previous = self
            .operations
            .find_financials(current.agency_id, current.operation_id)
            .await?;
        self.operations.save_financials(&current).await?;

        let agency_id = current.agency_id;
        let operation_id = current.operation_id;
        let previous = previous.as_ref();
        let current = &current;

        let report = FanOut::new()
            .task("sale_iva", async move {
                if current.sale_amount.is_zero() {
                    self.iva.delete_sale_iva(agency_id, operation_id).await?;
                } else {
                    self.iva
                        .upsert_sale_iva(&SaleIvaInput {
                            agency_id,
                            operation_id,
                            sale_amount: current.sale_amount,
                            sale_currency: current.sale_currency,
                            operator_cost: current.operator_cost,
                            operator_cost_currency: current.operator_cost_currency,
                            exchange_rate: current.exchange_rate,
                        })
                        .await?;
                }
                Ok(())
            })
            .task("purchase_iva", async move {
                if current.operator_cost.is_zero() {
                    self.iva.delete_purchase_iva(agency_id, operation_id).await?;
                } else {
                    self.iva
                        .upsert_purchase_iva(
                            agency_id,
                            operation_id,
                            current.operator_cost,
                            current.operator_cost_currency,
                        )
                        .await?;
                }
                Ok(())
            })
            .task("operator_payment", async move {
                sync_operator_payment(self.payments.as_ref(), previous, current).await?;
                Ok(())
            })
            .task("currency_change", async move {
                if let Some(prev) = previous.filter(|p| current.currency_changed_from(p)) {
                    warn!(
                        %operation_id,
                        old_sale_currency = %prev.sale_currency,
                        new_sale_currency = %current.sale_currency,
                        old_cost_currency = %prev.operator_cost_currency,
                        new_cost_currency = %current.operator_cost_currency,
                        "operation currency changed, existing movements keep their original currency"
                    );
                }
                Ok(())
            })
            .run()
            .await;

        self.signal.kpis_changed(agency_id);
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "operation financials synced"
        );
        Ok(report)
    }

    /// Deletes the operation's movements, then its IVA records, pending
    /// payables and snapshot.
    ///
    /// # Errors
    ///
    /// Fails only if the movements cannot be deleted.
    #[instrument(skip(self))]
    pub async fn delete_operation_financials(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<OperationDeletion> {
        let movements_deleted = self
            .ledger
            .delete_operation_movements(agency_id, operation_id)
            .await?;

        let report = FanOut::new()
            .task("sale_iva", async move {
                self.iva.delete_sale_iva(agency_id, operation_id).await?;
                Ok(())
            })
            .task("purchase_iva", async move {
                self.iva.delete_purchase_iva(agency_id, operation_id).await?;
                Ok(())
            })
            .task("operator_payment", async move {
                self.payments
                    .delete_pending(agency_id, operation_id, None)
                    .await?;
                Ok(())
            })
            .task("snapshot", async move {
                self.operations
                    .delete_financials(agency_id, operation_id)
                    .await?;
                Ok(())
            })
            .run()
            .await;

        self.signal.kpis_changed(agency_id);
        info!(movements_deleted, "operation financials deleted");
        Ok(OperationDeletion {
            movements_deleted,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::ExchangeRateResolver;
    use crate::iva::IvaStore;
    use crate::operation::OperatorPaymentStore;
    use crate::signal::BroadcastSignal;
    use crate::testing::{
        FailingIva, InMemoryExchangeRates, InMemoryIva, InMemoryLedger, InMemoryOperations,
        InMemoryOperatorPayments, operation_financials,
    };
    use rust_decimal_macros::dec;
    use tesoro_shared::types::{Currency, OperatorId};

    struct Fixture {
        service: OperationFinancialsService,
        operations: Arc<InMemoryOperations>,
        payments: Arc<InMemoryOperatorPayments>,
        signal: BroadcastSignal,
    }

    fn fixture(iva_store: Arc<dyn IvaStore>) -> Fixture {
        let operations = Arc::new(InMemoryOperations::default());
        let payments = Arc::new(InMemoryOperatorPayments::default());
        let signal = BroadcastSignal::new(16);
        let resolver = Arc::new(ExchangeRateResolver::new(
            Arc::new(InMemoryExchangeRates::default()),
            None,
        ));
        let ledger = Arc::new(LedgerService::new(
            Arc::new(InMemoryLedger::default()),
            resolver,
            Arc::new(signal.clone()),
            false,
        ));
        let service = OperationFinancialsService::new(
            operations.clone(),
            Arc::new(IvaService::new(iva_store)),
            payments.clone(),
            ledger,
            Arc::new(signal.clone()),
        );
        Fixture {
            service,
            operations,
            payments,
            signal,
        }
    }

    #[tokio::test]
    async fn test_sync_runs_every_task() {
        let iva = Arc::new(InMemoryIva::default());
        let f = fixture(iva.clone());
        let mut rx = f.signal.subscribe();
        let mut ops = operation_financials(dec!(3000), dec!(2400));
        ops.operator_id = Some(OperatorId::new());

        let report = f.service.sync_operation_financials(ops.clone()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.succeeded.len(), 4);
        assert_eq!(iva.sale_count(), 1);
        assert_eq!(f.payments.len(), 1);
        assert_eq!(rx.recv().await.unwrap(), ops.agency_id);
    }

    #[tokio::test]
    async fn test_iva_failure_does_not_roll_back_primary_save() {
        let f = fixture(Arc::new(FailingIva));
        let mut ops = operation_financials(dec!(3000), dec!(2400));
        ops.operator_id = Some(OperatorId::new());

        let report = f.service.sync_operation_financials(ops.clone()).await.unwrap();

        assert!(report.has_failed("sale_iva"));
        assert!(report.has_failed("purchase_iva"));
        assert!(report.succeeded.contains(&"operator_payment"));
        let saved = f
            .operations
            .find_financials(ops.agency_id, ops.operation_id)
            .await
            .unwrap();
        assert_eq!(saved, Some(ops));
        assert_eq!(f.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_rate_surfaces_as_failed_task() {
        let iva = Arc::new(InMemoryIva::default());
        let f = fixture(iva.clone());
        let mut ops = operation_financials(dec!(3000), dec!(2400000));
        ops.operator_cost_currency = Currency::Ars;

        let report = f.service.sync_operation_financials(ops).await.unwrap();

        assert!(report.has_failed("sale_iva"));
        assert!(report.succeeded.contains(&"purchase_iva"));
        assert_eq!(iva.sale_count(), 0);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected_before_save() {
        let f = fixture(Arc::new(InMemoryIva::default()));
        let ops = operation_financials(dec!(-1), dec!(0));
        let err = f.service.sync_operation_financials(ops.clone()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(
            f.operations
                .find_financials(ops.agency_id, ops.operation_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let iva = Arc::new(InMemoryIva::default());
        let f = fixture(iva.clone());
        let mut ops = operation_financials(dec!(3000), dec!(2400));
        ops.operator_id = Some(OperatorId::new());
        f.service.sync_operation_financials(ops.clone()).await.unwrap();

        let deletion = f
            .service
            .delete_operation_financials(ops.agency_id, ops.operation_id)
            .await
            .unwrap();

        assert!(deletion.report.is_complete());
        assert_eq!(iva.sale_count(), 0);
        assert_eq!(f.payments.len(), 0);
        assert!(
            f.payments
                .find(ops.agency_id, ops.operation_id, ops.operator_id.unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }
}
