//! Fiscal domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tesoro_shared::types::{AgencyId, Currency, CustomerId, InvoiceId, OperationId};

/// Voucher type (`CbteTipo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum VoucherType {
    /// Factura A.
    FacturaA,
    /// Nota de débito A.
    NotaDebitoA,
    /// Nota de crédito A.
    NotaCreditoA,
    /// Factura B.
    FacturaB,
    /// Nota de débito B.
    NotaDebitoB,
    /// Nota de crédito B.
    NotaCreditoB,
    /// Factura C.
    FacturaC,
    /// Nota de débito C.
    NotaDebitoC,
    /// Nota de crédito C.
    NotaCreditoC,
}

impl VoucherType {
    /// Authority code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::FacturaA => 1,
            Self::NotaDebitoA => 2,
            Self::NotaCreditoA => 3,
            Self::FacturaB => 6,
            Self::NotaDebitoB => 7,
            Self::NotaCreditoB => 8,
            Self::FacturaC => 11,
            Self::NotaDebitoC => 12,
            Self::NotaCreditoC => 13,
        }
    }

    /// Parses an authority code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::FacturaA),
            2 => Some(Self::NotaDebitoA),
            3 => Some(Self::NotaCreditoA),
            6 => Some(Self::FacturaB),
            7 => Some(Self::NotaDebitoB),
            8 => Some(Self::NotaCreditoB),
            11 => Some(Self::FacturaC),
            12 => Some(Self::NotaDebitoC),
            13 => Some(Self::NotaCreditoC),
            _ => None,
        }
    }

    /// Class C vouchers carry no IVA breakdown.
    #[must_use]
    pub const fn discriminates_iva(self) -> bool {
        !matches!(self, Self::FacturaC | Self::NotaDebitoC | Self::NotaCreditoC)
    }
}

impl TryFrom<i32> for VoucherType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("Unknown voucher type: {code}"))
    }
}

impl From<VoucherType> for i32 {
    fn from(value: VoucherType) -> Self {
        value.code()
    }
}

/// What the invoice bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Concept {
    /// Goods.
    Products,
    /// Services.
    Services,
    /// Goods and services.
    ProductsAndServices,
}

impl Concept {
    /// Authority code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Products => 1,
            Self::Services => 2,
            Self::ProductsAndServices => 3,
        }
    }

    /// Service-period dates are mandatory for concepts 2 and 3.
    #[must_use]
    pub const fn requires_service_dates(self) -> bool {
        !matches!(self, Self::Products)
    }
}

impl TryFrom<i32> for Concept {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Products),
            2 => Ok(Self::Services),
            3 => Ok(Self::ProductsAndServices),
            _ => Err(format!("Unknown concept: {code}")),
        }
    }
}

impl From<Concept> for i32 {
    fn from(value: Concept) -> Self {
        value.code()
    }
}

/// IVA rate bucket with its authority id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum IvaRateBucket {
    /// 0%.
    Zero,
    /// 10.5%.
    TenFive,
    /// 21%.
    TwentyOne,
    /// 27%.
    TwentySeven,
    /// 5%.
    Five,
    /// 2.5%.
    TwoFive,
}

impl IvaRateBucket {
    /// Authority id of the bucket.
    #[must_use]
    pub const fn id(self) -> i32 {
        match self {
            Self::Zero => 3,
            Self::TenFive => 4,
            Self::TwentyOne => 5,
            Self::TwentySeven => 6,
            Self::Five => 8,
            Self::TwoFive => 9,
        }
    }

    /// Rate as a fraction.
    #[must_use]
    pub const fn rate(self) -> Decimal {
        match self {
            Self::Zero => Decimal::ZERO,
            Self::TenFive => Decimal::from_parts(105, 0, 0, false, 3),
            Self::TwentyOne => Decimal::from_parts(21, 0, 0, false, 2),
            Self::TwentySeven => Decimal::from_parts(27, 0, 0, false, 2),
            Self::Five => Decimal::from_parts(5, 0, 0, false, 2),
            Self::TwoFive => Decimal::from_parts(25, 0, 0, false, 3),
        }
    }

    /// Bucket of a rate, if it is one of the supported ones.
    #[must_use]
    pub fn from_rate(rate: Decimal) -> Option<Self> {
        [
            Self::Zero,
            Self::TenFive,
            Self::TwentyOne,
            Self::TwentySeven,
            Self::Five,
            Self::TwoFive,
        ]
        .into_iter()
        .find(|bucket| bucket.rate() == rate)
    }
}

impl TryFrom<i32> for IvaRateBucket {
    type Error = String;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        match id {
            3 => Ok(Self::Zero),
            4 => Ok(Self::TenFive),
            5 => Ok(Self::TwentyOne),
            6 => Ok(Self::TwentySeven),
            8 => Ok(Self::Five),
            9 => Ok(Self::TwoFive),
            _ => Err(format!("Unknown IVA rate id: {id}")),
        }
    }
}

impl From<IvaRateBucket> for i32 {
    fn from(value: IvaRateBucket) -> Self {
        value.id()
    }
}

/// Invoice lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Being edited.
    Draft,
    /// Ready, or waiting for a retry after a failed round-trip.
    Pending,
    /// Request in flight.
    Sent,
    /// CAE obtained.
    Authorized,
    /// Rejected by the authority.
    Rejected,
    /// Voided.
    Cancelled,
}

impl InvoiceStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Authorized => "authorized",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether an authorization attempt may start from this status.
    ///
    /// `Sent` qualifies: attempts run under the allocation lock, so a `sent`
    /// invoice seen by the lock holder belongs to an interrupted attempt.
    #[must_use]
    pub const fn can_authorize(self) -> bool {
        matches!(
            self,
            Self::Draft | Self::Pending | Self::Sent | Self::Rejected
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "authorized" => Ok(Self::Authorized),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown invoice status: {s}")),
        }
    }
}

/// One IVA line of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvaLine {
    /// Rate bucket.
    pub bucket: IvaRateBucket,
    /// Taxable base.
    pub base: Decimal,
    /// IVA amount.
    pub amount: Decimal,
}

/// Observation or error returned by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityMessage {
    /// Authority code.
    pub code: i64,
    /// Message text.
    pub message: String,
}

/// A fiscal invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice id.
    pub id: InvoiceId,
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Linked operation.
    pub operation_id: Option<OperationId>,
    /// Linked customer.
    pub customer_id: Option<CustomerId>,
    /// Voucher type.
    pub cbte_tipo: VoucherType,
    /// Point of sale.
    pub pto_vta: i32,
    /// Voucher number; set by an authorization attempt.
    pub cbte_nro: Option<i64>,
    /// Authorization code.
    pub cae: Option<String>,
    /// CAE expiry.
    pub cae_fch_vto: Option<NaiveDate>,
    /// Concept.
    pub concepto: Concept,
    /// Receiver document type (80 CUIT, 96 DNI, 99 final consumer).
    pub doc_tipo: i32,
    /// Receiver document number.
    pub doc_nro: i64,
    /// Net taxed amount.
    pub imp_neto: Decimal,
    /// Total IVA.
    pub imp_iva: Decimal,
    /// Exempt amount.
    pub imp_op_ex: Decimal,
    /// Untaxed amount.
    pub imp_tot_conc: Decimal,
    /// Other taxes.
    pub imp_trib: Decimal,
    /// Invoice total.
    pub imp_total: Decimal,
    /// IVA per rate.
    pub iva_lines: Vec<IvaLine>,
    /// Currency.
    pub moneda: Currency,
    /// ARS per unit of `moneda`; required for USD.
    pub moneda_cotizacion: Option<Decimal>,
    /// Service period start.
    pub fch_serv_desde: Option<NaiveDate>,
    /// Service period end.
    pub fch_serv_hasta: Option<NaiveDate>,
    /// Payment due date.
    pub fch_vto_pago: Option<NaiveDate>,
    /// Lifecycle status.
    pub status: InvoiceStatus,
    /// Issue date of the last attempt.
    pub fecha_emision: Option<NaiveDate>,
    /// Observations and errors of the last attempt.
    pub observations: Vec<AuthorityMessage>,
}

/// IVA aggregated per bucket (`AlicIva`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvaAlicuota {
    /// Bucket id.
    pub id: i32,
    /// Taxable base.
    pub base_imp: Decimal,
    /// IVA amount.
    pub importe: Decimal,
}

/// Authorization request for one voucher (`FECAEDetRequest`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRequest {
    /// Point of sale.
    pub pto_vta: i32,
    /// Voucher type code.
    pub cbte_tipo: i32,
    /// Number requested.
    pub cbte_nro: i64,
    /// Concept code.
    pub concepto: i32,
    /// Receiver document type.
    pub doc_tipo: i32,
    /// Receiver document number.
    pub doc_nro: i64,
    /// Issue date.
    pub cbte_fch: NaiveDate,
    /// Total.
    pub imp_total: Decimal,
    /// Untaxed.
    pub imp_tot_conc: Decimal,
    /// Net taxed.
    pub imp_neto: Decimal,
    /// Exempt.
    pub imp_op_ex: Decimal,
    /// IVA.
    pub imp_iva: Decimal,
    /// Other taxes.
    pub imp_trib: Decimal,
    /// Currency code (`PES`, `DOL`).
    pub mon_id: String,
    /// Currency quote.
    pub mon_cotiz: Decimal,
    /// IVA per bucket; empty for class C.
    pub iva: Vec<IvaAlicuota>,
    /// Service period start.
    pub fch_serv_desde: Option<NaiveDate>,
    /// Service period end.
    pub fch_serv_hasta: Option<NaiveDate>,
    /// Payment due date.
    pub fch_vto_pago: Option<NaiveDate>,
}

/// Raw authority answer for one voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityResponse {
    /// `A` approved, `R` rejected, `P` partial.
    pub resultado: String,
    /// Authorization code.
    pub cae: Option<String>,
    /// CAE expiry.
    pub cae_fch_vto: Option<NaiveDate>,
    /// Observations.
    #[serde(default)]
    pub observations: Vec<AuthorityMessage>,
    /// Errors.
    #[serde(default)]
    pub errors: Vec<AuthorityMessage>,
}

/// Interpreted authority answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityOutcome {
    /// Approved with a CAE.
    Approved {
        /// Authorization code.
        cae: String,
        /// CAE expiry.
        expires_on: Option<NaiveDate>,
        /// Observations attached to the approval.
        messages: Vec<AuthorityMessage>,
    },
    /// Rejected.
    Rejected {
        /// Observations and errors.
        messages: Vec<AuthorityMessage>,
    },
}

impl AuthorityResponse {
    /// Approved iff `Resultado = 'A'` and a CAE is present.
    #[must_use]
    pub fn outcome(self) -> AuthorityOutcome {
        let mut messages = self.errors;
        messages.extend(self.observations);
        match (self.resultado.trim(), self.cae) {
            ("A", Some(cae)) if !cae.trim().is_empty() => AuthorityOutcome::Approved {
                cae,
                expires_on: self.cae_fch_vto,
                messages,
            },
            _ => AuthorityOutcome::Rejected { messages },
        }
    }
}
