//! Fiscal onboarding automation.
//!
//! Production credentials are obtained through two external automations run
//! in sequence: create the certificate, then authorize the invoicing web
//! service for it. Each is submitted and, unless it completes immediately,
//! polled on a fixed interval up to a bounded number of attempts.

pub mod error;
pub mod poller;
pub mod service;
pub mod types;

pub use error::OnboardingError;
pub use poller::{AutomationBridge, OnboardingPoller, PollPolicy, is_already_exists};
pub use service::OnboardingService;
pub use types::{
    AutomationKind, AutomationReply, AutomationStatus, OnboardingRequest, OnboardingState,
};
