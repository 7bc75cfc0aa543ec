//! Ledger domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tesoro_shared::types::{
    AgencyId, CashBoxId, Currency, FinancialAccountId, LeadId, MovementId, OperationId,
    OperatorId, SellerId, UserId,
};

/// Whether a movement adds to or subtracts from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Money coming in.
    Inflow,
    /// Money going out.
    Outflow,
}

/// Kind of financial fact a movement records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Customer payment or other income.
    Income,
    /// General expense.
    Expense,
    /// Positive exchange difference.
    FxGain,
    /// Negative exchange difference.
    FxLoss,
    /// Commission paid to a seller.
    Commission,
    /// Payment to an operator (supplier).
    OperatorPayment,
    /// Withdrawal by a partner.
    PartnerWithdrawal,
}

impl MovementType {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
            Self::FxGain => "FX_GAIN",
            Self::FxLoss => "FX_LOSS",
            Self::Commission => "COMMISSION",
            Self::OperatorPayment => "OPERATOR_PAYMENT",
            Self::PartnerWithdrawal => "PARTNER_WITHDRAWAL",
        }
    }

    /// Direction of the movement.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Income | Self::FxGain => Direction::Inflow,
            Self::Expense
            | Self::FxLoss
            | Self::Commission
            | Self::OperatorPayment
            | Self::PartnerWithdrawal => Direction::Outflow,
        }
    }

    /// Applies the direction to an unsigned amount.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self.direction() {
            Direction::Inflow => amount,
            Direction::Outflow => -amount,
        }
    }
}

impl std::str::FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            "FX_GAIN" => Ok(Self::FxGain),
            "FX_LOSS" => Ok(Self::FxLoss),
            "COMMISSION" => Ok(Self::Commission),
            "OPERATOR_PAYMENT" => Ok(Self::OperatorPayment),
            "PARTNER_WITHDRAWAL" => Ok(Self::PartnerWithdrawal),
            _ => Err(format!("Unknown movement type: {s}")),
        }
    }
}

/// How money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash.
    Cash,
    /// Bank transfer.
    Bank,
    /// Credit or debit card.
    Card,
    /// Mercado Pago.
    Mercadopago,
    /// Anything else.
    Other,
}

impl PaymentMethod {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Bank => "BANK",
            Self::Card => "CARD",
            Self::Mercadopago => "MERCADOPAGO",
            Self::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(Self::Cash),
            "BANK" => Ok(Self::Bank),
            "CARD" => Ok(Self::Card),
            "MERCADOPAGO" => Ok(Self::Mercadopago),
            "OTHER" => Ok(Self::Other),
            _ => Err(format!("Unknown payment method: {s}")),
        }
    }
}

/// Immutable, currency-normalized financial fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMovement {
    /// Movement id.
    pub id: MovementId,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Linked operation.
    pub operation_id: Option<OperationId>,
    /// Linked lead.
    pub lead_id: Option<LeadId>,
    /// Kind of movement.
    pub movement_type: MovementType,
    /// Free-text concept.
    pub concept: String,
    /// Currency of `amount_original`.
    pub currency: Currency,
    /// Amount as entered, always positive.
    pub amount_original: Decimal,
    /// ARS per USD, `None` iff `currency` is the base currency.
    pub exchange_rate: Option<Decimal>,
    /// Base-currency equivalent, used for every cross-currency aggregation.
    pub amount_ars_equivalent: Decimal,
    /// Payment method.
    pub method: PaymentMethod,
    /// Financial account the movement belongs to.
    pub account_id: FinancialAccountId,
    /// Cash box the movement is routed to.
    pub cash_box_id: Option<CashBoxId>,
    /// Linked operator.
    pub operator_id: Option<OperatorId>,
    /// Linked seller.
    pub seller_id: Option<SellerId>,
    /// Date used to resolve the exchange rate.
    pub movement_date: NaiveDate,
    /// Author.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl LedgerMovement {
    /// Signed base-currency amount.
    #[must_use]
    pub fn signed_ars_equivalent(&self) -> Decimal {
        self.movement_type.signed(self.amount_ars_equivalent)
    }

    /// Signed amount in the original currency.
    #[must_use]
    pub fn signed_original(&self) -> Decimal {
        self.movement_type.signed(self.amount_original)
    }
}

/// Input for recording a movement.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordMovementInput {
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Linked operation.
    #[serde(default)]
    pub operation_id: Option<OperationId>,
    /// Linked lead.
    #[serde(default)]
    pub lead_id: Option<LeadId>,
    /// Kind of movement.
    pub movement_type: MovementType,
    /// Free-text concept.
    pub concept: String,
    /// Currency of `amount`.
    pub currency: Currency,
    /// Amount, must be positive.
    pub amount: Decimal,
    /// Payment method.
    pub method: PaymentMethod,
    /// Financial account.
    pub account_id: FinancialAccountId,
    /// Cash box to route the movement to.
    #[serde(default)]
    pub cash_box_id: Option<CashBoxId>,
    /// Linked operator.
    #[serde(default)]
    pub operator_id: Option<OperatorId>,
    /// Linked seller.
    #[serde(default)]
    pub seller_id: Option<SellerId>,
    /// Date used to resolve the exchange rate.
    pub movement_date: NaiveDate,
    /// Author.
    pub created_by: UserId,
}

/// A tenant-scoped financial account. Its balance is always derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialAccount {
    /// Account id.
    pub id: FinancialAccountId,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Display name.
    pub name: String,
    /// Free-form account type (e.g. `BANK`, `CASH`).
    pub account_type: String,
    /// Account currency.
    pub currency: Currency,
    /// Opening balance.
    pub initial_balance: Decimal,
    /// Inactive accounts reject new movements.
    pub is_active: bool,
}

/// A tenant-scoped till with a cached balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashBox {
    /// Cash box id.
    pub id: CashBoxId,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Display name.
    pub name: String,
    /// Box currency.
    pub currency: Currency,
    /// Opening balance.
    pub initial_balance: Decimal,
    /// Cached balance kept in lockstep by the recorder.
    pub current_balance: Decimal,
    /// Default box for its currency.
    pub is_default: bool,
    /// Inactive boxes reject new movements.
    pub is_active: bool,
}

/// Signed change to apply to a cash box's cached balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashBoxDelta {
    /// Target box.
    pub cash_box_id: CashBoxId,
    /// Signed amount in the box currency.
    pub amount: Decimal,
}

impl CashBoxDelta {
    /// The delta that undoes this one.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            cash_box_id: self.cash_box_id,
            amount: -self.amount,
        }
    }
}
