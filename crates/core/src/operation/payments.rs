//! Operator payables.

use async_trait::async_trait;
use tesoro_shared::AppResult;
use tesoro_shared::types::{AgencyId, OperationId, OperatorId, OperatorPaymentId};
use tracing::debug;

use super::types::{OperationFinancials, OperatorPayment, OperatorPaymentStatus};

/// Storage of operator payables.
#[async_trait]
pub trait OperatorPaymentStore: Send + Sync {
    /// Finds the payable of an operator for an operation.
    async fn find(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
        operator_id: OperatorId,
    ) -> AppResult<Option<OperatorPayment>>;

    /// Inserts or replaces a payable by id.
    async fn upsert(&self, payment: &OperatorPayment) -> AppResult<()>;

    /// Deletes pending payables of the operation, optionally only those of
    /// one operator. Paid ones are kept. Returns the number deleted.
    async fn delete_pending(
        &self,
        agency_id: AgencyId,
        operation_id: OperationId,
        operator_id: Option<OperatorId>,
    ) -> AppResult<u64>;
}

/// What the payable sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSync {
    /// A new pending payable was created.
    Created,
    /// The pending payable was updated.
    Updated,
    /// The payable is already paid and was left untouched.
    AlreadyPaid,
    /// No operator or no cost; pending payables were removed.
    Removed(u64),
}

/// Keeps one pending payable per (operation, operator) in step with the cost.
///
/// # Errors
///
/// Returns a storage failure.
pub async fn sync_operator_payment(
    store: &dyn OperatorPaymentStore,
    previous: Option<&OperationFinancials>,
    current: &OperationFinancials,
) -> AppResult<PaymentSync> {
    let agency_id = current.agency_id;
    let operation_id = current.operation_id;

    if let Some(old_operator) = previous.and_then(|p| p.operator_id)
        && current.operator_id != Some(old_operator)
    {
        store
            .delete_pending(agency_id, operation_id, Some(old_operator))
            .await?;
    }

    let Some(operator_id) = current.operator_id.filter(|_| !current.operator_cost.is_zero()) else {
        let removed = store.delete_pending(agency_id, operation_id, None).await?;
        return Ok(PaymentSync::Removed(removed));
    };

    match store.find(agency_id, operation_id, operator_id).await? {
        Some(existing) if existing.status == OperatorPaymentStatus::Paid => {
            debug!(%operation_id, %operator_id, "operator payment already paid, not touching it");
            Ok(PaymentSync::AlreadyPaid)
        }
        Some(existing) => {
            let updated = OperatorPayment {
                amount: current.operator_cost,
                currency: current.operator_cost_currency,
                due_date: current.payment_due_date.or(existing.due_date),
                ..existing
            };
            store.upsert(&updated).await?;
            Ok(PaymentSync::Updated)
        }
        None => {
            let created = OperatorPayment {
                id: OperatorPaymentId::new(),
                agency_id,
                operation_id,
                operator_id,
                amount: current.operator_cost,
                currency: current.operator_cost_currency,
                due_date: current.payment_due_date,
                status: OperatorPaymentStatus::Pending,
            };
            store.upsert(&created).await?;
            Ok(PaymentSync::Created)
        }
    }
}
