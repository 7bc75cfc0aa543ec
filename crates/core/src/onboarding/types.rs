//! Onboarding types.

use serde::{Deserialize, Serialize};

/// The two automations, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationKind {
    /// Create the production certificate.
    CreateCertificate,
    /// Authorize the invoicing web service for the certificate.
    AuthorizeWebService,
}

impl AutomationKind {
    /// Automation name understood by the bridge.
    #[must_use]
    pub const fn automation_name(self) -> &'static str {
        match self {
            Self::CreateCertificate => "create-cert-prod",
            Self::AuthorizeWebService => "auth-web-service-prod",
        }
    }
}

/// Status reported by the automation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationStatus {
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Error,
    /// Finished with a failure.
    Failed,
    /// Queued.
    Pending,
    /// Running.
    InProcess,
    /// Anything else; treated as not finished.
    Other(String),
}

impl AutomationStatus {
    /// Parses a status string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "complete" | "completed" => Self::Complete,
            "error" => Self::Error,
            "failed" => Self::Failed,
            "pending" => Self::Pending,
            "in_process" | "in-process" | "processing" => Self::InProcess,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for `error` and `failed`.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Failed)
    }
}

/// Reply to a submit or poll.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationReply {
    /// Status.
    pub status: AutomationStatus,
    /// Job id to poll.
    pub job_id: Option<String>,
    /// Result payload.
    pub data: Option<serde_json::Value>,
    /// Error or progress message.
    pub message: Option<String>,
}

/// Inputs of an onboarding run.
#[derive(Clone, Deserialize)]
pub struct OnboardingRequest {
    /// Taxpayer id.
    pub cuit: i64,
    /// Point of sale to invoice from.
    pub pto_vta: i32,
    /// Login at the authority's portal.
    pub username: String,
    /// Password at the authority's portal.
    pub password: String,
    /// Certificate alias.
    pub alias: String,
    /// Web service to authorize.
    #[serde(default = "default_service")]
    pub service: String,
}

fn default_service() -> String {
    "wsfe".to_string()
}

impl std::fmt::Debug for OnboardingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingRequest")
            .field("cuit", &self.cuit)
            .field("pto_vta", &self.pto_vta)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("alias", &self.alias)
            .field("service", &self.service)
            .finish()
    }
}

/// Persisted onboarding progress of an agency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingState {
    /// Not started.
    #[default]
    Pending,
    /// Running in the background.
    InProcess,
    /// Both stages done.
    Complete,
    /// A stage reported an error.
    Error,
    /// A stage ran out of poll attempts.
    Timeout,
}

impl OnboardingState {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProcess => "in_process",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

impl std::str::FromStr for OnboardingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_process" => Ok(Self::InProcess),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            "timeout" => Ok(Self::Timeout),
            _ => Err(format!("Unknown onboarding state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(AutomationStatus::parse("complete"), AutomationStatus::Complete);
        assert_eq!(AutomationStatus::parse(" ERROR "), AutomationStatus::Error);
        assert!(AutomationStatus::parse("failed").is_failure());
        assert_eq!(
            AutomationStatus::parse("queued"),
            AutomationStatus::Other("queued".into())
        );
    }

    #[test]
    fn test_request_debug_redacts_password() {
        let request = OnboardingRequest {
            cuit: 20_123_456_789,
            pto_vta: 1,
            username: "20123456789".into(),
            password: "hunter2".into(),
            alias: "tesoro".into(),
            service: default_service(),
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
