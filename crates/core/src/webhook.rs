//! Pieces shared by the payment and card-board webhook ingestors.
//!
//! Senders retry until they get a 2xx, so ingestors acknowledge everything
//! except bad signatures in production. Internal failures go to a durable
//! [`WebhookFailureLog`] instead of the response.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tesoro_shared::{AppError, AppResult};
use thiserror::Error;
use tracing::{error, warn};

/// Which integration a webhook came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookSource {
    /// Payment provider.
    Billing,
    /// Card board.
    CardBoard,
}

impl WebhookSource {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::CardBoard => "card_board",
        }
    }
}

/// One failed webhook application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookFailure {
    /// Integration.
    pub source: WebhookSource,
    /// Event type, when it could be parsed.
    pub event_type: Option<String>,
    /// Remote id the event refers to.
    pub external_id: Option<String>,
    /// Error message.
    pub error: String,
    /// Raw payload (lossy UTF-8).
    pub payload: String,
    /// When it failed.
    pub occurred_at: DateTime<Utc>,
}

impl WebhookFailure {
    /// Builds a failure stamped now.
    #[must_use]
    pub fn new(source: WebhookSource, raw_body: &[u8], error: impl Into<String>) -> Self {
        Self {
            source,
            event_type: None,
            external_id: None,
            error: error.into(),
            payload: String::from_utf8_lossy(raw_body).into_owned(),
            occurred_at: Utc::now(),
        }
    }

    /// Sets the event type.
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the external id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// Durable log of webhook failures.
#[async_trait]
pub trait WebhookFailureLog: Send + Sync {
    /// Appends a failure.
    async fn record(&self, failure: &WebhookFailure) -> AppResult<()>;
}

/// Appends to the failure log; a failing log is itself only logged.
pub async fn log_failure(log: &dyn WebhookFailureLog, failure: WebhookFailure) {
    warn!(
        source = failure.source.as_str(),
        event_type = failure.event_type.as_deref(),
        external_id = failure.external_id.as_deref(),
        error = %failure.error,
        "webhook not applied"
    );
    if let Err(e) = log.record(&failure).await {
        error!(error = %e, "could not write webhook failure log");
    }
}

/// What happened to an accepted webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// State was changed.
    Applied,
    /// Already applied before.
    Duplicate,
    /// Nothing to do.
    Ignored(String),
    /// Could not be applied; recorded in the failure log.
    Failed(String),
}

/// Result of checking a webhook signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature matches.
    Valid,
    /// No secret configured.
    NoSecret,
    /// The request carried no usable signature.
    Missing,
    /// The signature does not match.
    Invalid,
}

/// Rejected webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature missing or wrong.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// No secret is configured in production.
    #[error("Webhook secret not configured")]
    SecretNotConfigured,
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

/// Applies the environment policy to a signature check.
///
/// Production rejects anything but a valid signature. Elsewhere problems are
/// logged and the webhook is accepted.
///
/// # Errors
///
/// Returns `WebhookError` in production when the check is not `Valid`.
pub fn admit(
    source: WebhookSource,
    check: &SignatureCheck,
    production: bool,
) -> Result<(), WebhookError> {
    let err = match check {
        SignatureCheck::Valid => return Ok(()),
        SignatureCheck::NoSecret => WebhookError::SecretNotConfigured,
        SignatureCheck::Missing | SignatureCheck::Invalid => WebhookError::InvalidSignature,
    };
    if production {
        warn!(source = source.as_str(), check = ?check, "webhook rejected");
        Err(err)
    } else {
        warn!(source = source.as_str(), check = ?check, "accepting unverified webhook outside production");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_policy() {
        assert!(admit(WebhookSource::Billing, &SignatureCheck::Valid, true).is_ok());
        assert!(admit(WebhookSource::Billing, &SignatureCheck::Invalid, false).is_ok());
        assert!(admit(WebhookSource::Billing, &SignatureCheck::NoSecret, false).is_ok());
        assert!(matches!(
            admit(WebhookSource::Billing, &SignatureCheck::Invalid, true),
            Err(WebhookError::InvalidSignature)
        ));
        assert!(matches!(
            admit(WebhookSource::CardBoard, &SignatureCheck::NoSecret, true),
            Err(WebhookError::SecretNotConfigured)
        ));
        assert!(admit(WebhookSource::CardBoard, &SignatureCheck::Missing, true).is_err());
    }

    #[test]
    fn test_webhook_error_is_unauthorized() {
        let err: AppError = WebhookError::InvalidSignature.into();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_failure_keeps_payload() {
        let failure = WebhookFailure::new(WebhookSource::Billing, b"{\"type\":\"payment\"}", "boom")
            .with_event_type("payment")
            .with_external_id("123");
        assert_eq!(failure.payload, "{\"type\":\"payment\"}");
        assert_eq!(failure.external_id.as_deref(), Some("123"));
    }
}
