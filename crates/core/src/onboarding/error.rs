//! Onboarding errors.

use tesoro_shared::AppError;
use thiserror::Error;

use super::types::AutomationKind;

/// Errors that end an onboarding run.
#[derive(Debug, Error)]
pub enum OnboardingError {
    /// The automation reported `error` or `failed`.
    #[error("{} failed: {message}", .stage.automation_name())]
    Stage {
        /// Failed stage.
        stage: AutomationKind,
        /// Reported message.
        message: String,
    },

    /// The automation did not finish within the attempt budget.
    #[error("{} did not finish after {attempts} polls", .stage.automation_name())]
    Timeout {
        /// Stage that timed out.
        stage: AutomationKind,
        /// Polls made.
        attempts: u32,
    },

    /// The automation neither completed nor returned a job id.
    #[error("{} returned no job id", .0.automation_name())]
    MissingJobId(AutomationKind),

    /// Another run is already in progress.
    #[error("Onboarding already in progress")]
    AlreadyRunning,

    /// Bridge or storage failure.
    #[error(transparent)]
    Service(#[from] AppError),
}

impl From<OnboardingError> for AppError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::Stage { .. } => Self::BusinessRule(err.to_string()),
            OnboardingError::Timeout { .. } | OnboardingError::MissingJobId(_) => {
                Self::ExternalService(err.to_string())
            }
            OnboardingError::AlreadyRunning => Self::Conflict(err.to_string()),
            OnboardingError::Service(inner) => inner,
        }
    }
}
