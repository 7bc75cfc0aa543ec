use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tesoro_shared::types::{AgencyId, OperationId, OperatorId};
use tesoro_shared::{AppError, AppResult};

use super::lock;
use crate::iva::{IvaPurchaseRecord, IvaSaleRecord, IvaStore};
use crate::operation::{
    OperationFinancials, OperationStore, OperatorPayment, OperatorPaymentStatus,
    OperatorPaymentStore,
};

type Key = (AgencyId, OperationId);

#[derive(Default)]
pub struct InMemoryIva {
    sales: Mutex<HashMap<Key, IvaSaleRecord>>,
    purchases: Mutex<HashMap<Key, IvaPurchaseRecord>>,
}

impl InMemoryIva {
    pub fn sale_count(&self) -> usize {
        lock(&self.sales).len()
    }

    pub fn purchase_count(&self) -> usize {
        lock(&self.purchases).len()
    }
}

#[async_trait]
impl IvaStore for InMemoryIva {
    async fn upsert_sale(&self, record: &IvaSaleRecord) -> AppResult<()> {
        lock(&self.sales).insert((record.agency_id, record.operation_id), record.clone());
        Ok(())
    }

    async fn upsert_purchase(&self, record: &IvaPurchaseRecord) -> AppResult<()> {
        lock(&self.purchases).insert((record.agency_id, record.operation_id), record.clone());
        Ok(())
    }

    async fn delete_sale(&self, agency_id: AgencyId, operation_id: OperationId) -> AppResult<bool> {
        Ok(lock(&self.sales).remove(&(agency_id, operation_id)).is_some())
    }

    async fn delete_purchase(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<bool> {
        Ok(lock(&self.purchases)
            .remove(&(agency_id, operation_id))
            .is_some())
    }

    async fn find_sale(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<IvaSaleRecord>> {
        Ok(lock(&self.sales).get(&(agency_id, operation_id)).cloned())
    }

    async fn find_purchase(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<IvaPurchaseRecord>> {
        Ok(lock(&self.purchases).get(&(agency_id, operation_id)).cloned())
    }
}

/// IVA store whose every call fails like an unreachable database.
pub struct FailingIva;

fn unavailable<T>() -> AppResult<T> {
    Err(AppError::Database("iva store unavailable".to_string()))
}

#[async_trait]
impl IvaStore for FailingIva {
    async fn upsert_sale(&self, _: &IvaSaleRecord) -> AppResult<()> {
        unavailable()
    }

    async fn upsert_purchase(&self, _: &IvaPurchaseRecord) -> AppResult<()> {
        unavailable()
    }

    async fn delete_sale(&self, _: AgencyId, _: OperationId) -> AppResult<bool> {
        unavailable()
    }

    async fn delete_purchase(&self, _: AgencyId, _: OperationId) -> AppResult<bool> {
        unavailable()
    }

    async fn find_sale(&self, _: AgencyId, _: OperationId) -> AppResult<Option<IvaSaleRecord>> {
        unavailable()
    }

    async fn find_purchase(
        &self,
        _: AgencyId,
        _: OperationId,
    ) -> AppResult<Option<IvaPurchaseRecord>> {
        unavailable()
    }
}

#[derive(Default)]
pub struct InMemoryOperatorPayments {
    payments: Mutex<Vec<OperatorPayment>>,
}

impl InMemoryOperatorPayments {
    pub fn len(&self) -> usize {
        lock(&self.payments).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mark_paid(&self, operation_id: OperationId, operator_id: OperatorId) {
        for p in lock(&self.payments)
            .iter_mut()
            .filter(|p| p.operation_id == operation_id && p.operator_id == operator_id)
        {
            p.status = OperatorPaymentStatus::Paid;
        }
    }
}

#[async_trait]
impl OperatorPaymentStore for InMemoryOperatorPayments {
    async fn find(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
        operator_id: OperatorId,
    ) -> AppResult<Option<OperatorPayment>> {
        Ok(lock(&self.payments)
            .iter()
            .find(|p| {
                p.agency_id == agency_id
                    && p.operation_id == operation_id
                    && p.operator_id == operator_id
            })
            .cloned())
    }

    async fn upsert(&self, payment: &OperatorPayment) -> AppResult<()> {
        let mut payments = lock(&self.payments);
        match payments.iter_mut().find(|p| p.id == payment.id) {
            Some(existing) => *existing = payment.clone(),
            None => payments.push(payment.clone()),
        }
        Ok(())
    }

    async fn delete_pending(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
        operator_id: Option<OperatorId>,
    ) -> AppResult<u64> {
        let mut payments = lock(&self.payments);
        let before = payments.len();
        payments.retain(|p| {
            !(p.agency_id == agency_id
                && p.operation_id == operation_id
                && p.status == OperatorPaymentStatus::Pending
                && operator_id.is_none_or(|o| o == p.operator_id))
        });
        Ok((before - payments.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryOperations {
    financials: Mutex<HashMap<Key, OperationFinancials>>,
}

#[async_trait]
impl OperationStore for InMemoryOperations {
    async fn find_financials(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<Option<OperationFinancials>> {
        Ok(lock(&self.financials).get(&(agency_id, operation_id)).cloned())
    }

    async fn save_financials(&self, financials: &OperationFinancials) -> AppResult<()> {
        lock(&self.financials).insert(
            (financials.agency_id, financials.operation_id),
            financials.clone(),
        );
        Ok(())
    }

    async fn delete_financials(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
    ) -> AppResult<bool> {
        Ok(lock(&self.financials)
            .remove(&(agency_id, operation_id))
            .is_some())
    }
}
