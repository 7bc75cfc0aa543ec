//! Operation financial types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tesoro_shared::types::{AgencyId, Currency, OperationId, OperatorId, OperatorPaymentId};

/// The money-relevant fields of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFinancials {
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Operation.
    pub operation_id: OperationId,
    /// Gross sale amount.
    pub sale_amount: Decimal,
    /// Sale currency.
    pub sale_currency: Currency,
    /// Operator (supplier) cost.
    pub operator_cost: Decimal,
    /// Operator cost currency.
    pub operator_cost_currency: Currency,
    /// Operator to be paid.
    #[serde(default)]
    pub operator_id: Option<OperatorId>,
    /// Rate agreed for the operation (ARS per USD).
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    /// Due date of the operator payable.
    #[serde(default)]
    pub payment_due_date: Option<NaiveDate>,
}

impl OperationFinancials {
    /// Returns true when either currency differs from `previous`.
    #[must_use]
    pub fn currency_changed_from(&self, previous: &Self) -> bool {
        self.sale_currency != previous.sale_currency
            || self.operator_cost_currency != previous.operator_cost_currency
    }
}

/// Status of an operator payable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorPaymentStatus {
    /// Not yet paid; follows the operation's cost.
    Pending,
    /// Paid; frozen.
    Paid,
}

impl OperatorPaymentStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
        }
    }
}

impl std::str::FromStr for OperatorPaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            _ => Err(format!("Unknown operator payment status: {s}")),
        }
    }
}

/// Amount owed to an operator for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorPayment {
    /// Payable id.
    pub id: OperatorPaymentId,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Operation.
    pub operation_id: OperationId,
    /// Operator.
    pub operator_id: OperatorId,
    /// Amount owed.
    pub amount: Decimal,
    /// Currency owed.
    pub currency: Currency,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Status.
    pub status: OperatorPaymentStatus,
}
