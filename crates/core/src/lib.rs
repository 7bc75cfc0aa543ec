//! Core business logic for Tesoro.
//!
//! This crate contains the financial ledger and fiscal invoice engine with
//! ZERO web or database dependencies. Persistence and outbound HTTP are
//! reached through the async traits each module declares; `tesoro-db` and
//! `tesoro-clients` provide the production implementations.
//!
//! # Modules
//!
//! - `currency` - USD→ARS exchange-rate resolution and conversion
//! - `ledger` - Movement recording, cash-box deltas and balance projection
//! - `iva` - Sales (margin) and purchase (cost) VAT positions
//! - `operation` - Best-effort fan-out of an operation's financial side effects
//! - `fiscal` - Invoice authorization against the tax authority
//! - `onboarding` - Polling of the certificate / web-service automations
//! - `billing` - Payment-provider webhooks and subscription state
//! - `cardboard` - Card-board webhooks synchronized into CRM leads
//! - `webhook` - Pieces shared by both webhook ingestors
//! - `signal` - "Dashboard KPIs changed" notifications

pub mod billing;
pub mod cardboard;
pub mod currency;
pub mod fiscal;
pub mod iva;
pub mod ledger;
pub mod onboarding;
pub mod operation;
pub mod signal;
pub mod webhook;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
