//! Outbound HTTP clients.
//!
//! Each client implements one port of `tesoro-core`:
//! - [`AfipSdkClient`]: fiscal RPC bridge and onboarding automations
//! - [`MercadoPagoClient`]: payment provider REST API
//! - [`TrelloClient`]: card-board REST API
//!
//! Transport failures and non-2xx answers surface as
//! `AppError::ExternalService`; 404 on a lookup is `None`.

pub mod afip;
mod http;
pub mod mercadopago;
pub mod trello;

pub use afip::AfipSdkClient;
pub use mercadopago::MercadoPagoClient;
pub use trello::TrelloClient;
