//! Payment-provider webhooks and subscription state.
//!
//! Subscription state is driven by provider notifications only. Each
//! notification is verified, the referenced payment or preapproval is
//! re-fetched from the provider, and the result is applied once through an
//! idempotent [`BillingEvent`] insert.

pub mod events;
pub mod ingestor;
pub mod provider;
pub mod signature;
pub mod store;
pub mod subscription;

pub use events::BillingEvent;
pub use ingestor::{PaymentWebhookIngestor, PaymentWebhookRequest};
pub use provider::{PaymentProvider, ProviderPayment, ProviderPreapproval};
pub use signature::{compute_signature, manifest, parse_signature_header, verify_signature};
pub use store::BillingStore;
pub use subscription::{
    ProviderStatus, Subscription, SubscriptionStatus, apply_payment_status,
    apply_preapproval_status,
};
