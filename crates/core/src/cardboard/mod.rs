//! Card-board webhooks synchronized into CRM leads.
//!
//! Webhook payloads are only used to find out which card changed. The card
//! is always re-fetched from the board API before a lead is written, so
//! out-of-order deliveries converge on the current remote state.

pub mod api;
pub mod ingestor;
pub mod signature;
pub mod store;
pub mod types;

pub use api::CardBoardApi;
pub use ingestor::{CardBoardWebhookIngestor, CardWebhookRequest};
pub use signature::{compute_card_signature, verify_card_signature};
pub use store::CardBoardStore;
pub use types::{BoardSettings, CardAction, CardEventKind, LeadFromCard, RemoteCard};
