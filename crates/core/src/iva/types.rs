//! IVA records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tesoro_shared::types::{AgencyId, Currency, OperationId};

/// Sales-side IVA of an operation, keyed by `operation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvaSaleRecord {
    /// Operation.
    pub operation_id: OperationId,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Gross sale amount.
    pub sale_amount_total: Decimal,
    /// Operator cost expressed in the sale currency.
    pub operator_cost_total: Decimal,
    /// Margin after IVA.
    pub net_amount: Decimal,
    /// IVA on the margin.
    pub iva_amount: Decimal,
    /// Sale currency.
    pub currency: Currency,
}

/// Purchase-side IVA of an operation, keyed by `operation_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvaPurchaseRecord {
    /// Operation.
    pub operation_id: OperationId,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// VAT-inclusive operator cost.
    pub operator_cost_total: Decimal,
    /// Cost without IVA.
    pub net_amount: Decimal,
    /// IVA included in the cost.
    pub iva_amount: Decimal,
    /// Cost currency.
    pub currency: Currency,
}

/// Inputs of a sales-side upsert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaleIvaInput {
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Operation.
    pub operation_id: OperationId,
    /// Gross sale amount.
    pub sale_amount: Decimal,
    /// Sale currency.
    pub sale_currency: Currency,
    /// Operator cost.
    pub operator_cost: Decimal,
    /// Operator cost currency.
    pub operator_cost_currency: Currency,
    /// The operation's own rate (ARS per USD), if any.
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
}
