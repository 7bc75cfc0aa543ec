//! Repository implementations of the `tesoro-core` store traits.
//!
//! Every query of tenant data filters on the agency id; upserts refuse to
//! touch rows owned by another agency.

pub mod billing;
pub mod card_board;
pub mod exchange_rate;
pub mod fiscal_settings;
pub mod invoice;
pub mod iva;
pub mod ledger;
pub mod operation;
pub mod webhook_failure;

pub use billing::BillingRepository;
pub use card_board::CardBoardRepository;
pub use exchange_rate::ExchangeRateRepository;
pub use fiscal_settings::FiscalSettingsRepository;
pub use invoice::InvoiceRepository;
pub use iva::IvaRepository;
pub use ledger::{CreateAccountInput, CreateCashBoxInput, LedgerRepository};
pub use operation::{OperationRepository, OperatorPaymentRepository};
pub use webhook_failure::WebhookFailureRepository;
