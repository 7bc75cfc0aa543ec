//! Bounded polling of the onboarding automations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tesoro_shared::{AppError, AppResult};
use tracing::{debug, info, instrument};

use super::error::OnboardingError;
use super::types::{AutomationKind, AutomationReply, AutomationStatus, OnboardingRequest};

/// Port to the automation API.
#[async_trait]
pub trait AutomationBridge: Send + Sync {
    /// Starts an automation.
    async fn submit(
        &self,
        kind: AutomationKind,
        request: &OnboardingRequest,
    ) -> AppResult<AutomationReply>;

    /// Reads the state of a running automation.
    async fn poll(&self, job_id: &str) -> AppResult<AutomationReply>;
}

/// Poll cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between polls.
    pub interval: Duration,
    /// Maximum polls per stage.
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Longest a live run can take: both stages polled to the limit, doubled
    /// for bridge latency. An `in_process` run older than this is dead.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_mul(4))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 24,
        }
    }
}

/// True when an error message says the certificate already exists.
#[must_use]
pub fn is_already_exists(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("already exist") || message.contains("ya existe")
}

/// Drives both stages to completion.
pub struct OnboardingPoller {
    bridge: Arc<dyn AutomationBridge>,
    policy: PollPolicy,
}

impl OnboardingPoller {
    /// Creates a poller.
    #[must_use]
    pub fn new(bridge: Arc<dyn AutomationBridge>, policy: PollPolicy) -> Self {
        Self { bridge, policy }
    }

    /// Poll cadence of this poller.
    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Runs certificate creation then web-service authorization.
    ///
    /// A certificate that already exists counts as created. Returns the
    /// result payload of the last stage.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure, timeout or bridge error.
    #[instrument(skip(self, request), fields(cuit = request.cuit))]
    pub async fn run(
        &self,
        request: &OnboardingRequest,
    ) -> Result<Option<serde_json::Value>, OnboardingError> {
        match self.run_stage(AutomationKind::CreateCertificate, request).await {
            Ok(_) => {}
            Err(OnboardingError::Stage { message, .. }) if is_already_exists(&message) => {
                info!("certificate already exists, continuing");
            }
            Err(OnboardingError::Service(AppError::ExternalService(message)))
                if is_already_exists(&message) =>
            {
                info!("certificate already exists, continuing");
            }
            Err(e) => return Err(e),
        }
        self.run_stage(AutomationKind::AuthorizeWebService, request)
            .await
    }

    /// Submits one automation and polls it until a terminal state.
    ///
    /// # Errors
    ///
    /// `Stage` on `error`/`failed`, `Timeout` once the budget is spent,
    /// `MissingJobId` if there is nothing to poll.
    pub async fn run_stage(
        &self,
        stage: AutomationKind,
        request: &OnboardingRequest,
    ) -> Result<Option<serde_json::Value>, OnboardingError> {
        let reply = self.bridge.submit(stage, request).await?;
        if let Some(done) = terminal(stage, &reply)? {
            return Ok(done);
        }
        let job_id = reply.job_id.ok_or(OnboardingError::MissingJobId(stage))?;
        debug!(stage = stage.automation_name(), %job_id, "automation submitted, polling");

        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.interval).await;
            let reply = self.bridge.poll(&job_id).await?;
            if let Some(done) = terminal(stage, &reply)? {
                info!(stage = stage.automation_name(), attempt, "automation complete");
                return Ok(done);
            }
            debug!(stage = stage.automation_name(), attempt, status = ?reply.status, "still running");
        }
        Err(OnboardingError::Timeout {
            stage,
            attempts: self.policy.max_attempts,
        })
    }
}

/// `Some(data)` when complete, error when failed, `None` while running.
fn terminal(
    stage: AutomationKind,
    reply: &AutomationReply,
) -> Result<Option<Option<serde_json::Value>>, OnboardingError> {
    match &reply.status {
        AutomationStatus::Complete => Ok(Some(reply.data.clone())),
        status if status.is_failure() => Err(OnboardingError::Stage {
            stage,
            message: reply
                .message
                .clone()
                .unwrap_or_else(|| "automation failed".to_string()),
        }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAutomation, onboarding_request};

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 3,
        }
    }

    #[tokio::test]
    async fn test_immediate_completion_skips_polling() {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(AutomationKind::CreateCertificate, FakeAutomation::complete());
        bridge.script_submit(AutomationKind::AuthorizeWebService, FakeAutomation::complete());
        let poller = OnboardingPoller::new(bridge.clone(), policy());

        poller.run(&onboarding_request()).await.unwrap();
        assert_eq!(bridge.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_polls_until_complete() {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(AutomationKind::CreateCertificate, FakeAutomation::running("job-1"));
        bridge.script_polls(
            "job-1",
            vec![FakeAutomation::running("job-1"), FakeAutomation::complete()],
        );
        bridge.script_submit(AutomationKind::AuthorizeWebService, FakeAutomation::complete());
        let poller = OnboardingPoller::new(bridge.clone(), policy());

        poller.run(&onboarding_request()).await.unwrap();
        assert_eq!(bridge.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_times_out_after_budget() {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(AutomationKind::CreateCertificate, FakeAutomation::running("job-1"));
        let poller = OnboardingPoller::new(bridge.clone(), policy());

        let err = poller.run(&onboarding_request()).await.unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::Timeout {
                stage: AutomationKind::CreateCertificate,
                attempts: 3
            }
        ));
        assert_eq!(bridge.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_error_propagates_message() {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(AutomationKind::CreateCertificate, FakeAutomation::complete());
        bridge.script_submit(
            AutomationKind::AuthorizeWebService,
            FakeAutomation::failed("clave fiscal incorrecta"),
        );
        let poller = OnboardingPoller::new(bridge, policy());

        let err = poller.run(&onboarding_request()).await.unwrap_err();
        match err {
            OnboardingError::Stage { stage, message } => {
                assert_eq!(stage, AutomationKind::AuthorizeWebService);
                assert_eq!(message, "clave fiscal incorrecta");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_existing_certificate_continues_to_stage_two() {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(
            AutomationKind::CreateCertificate,
            FakeAutomation::failed("The certificate already exists"),
        );
        bridge.script_submit(AutomationKind::AuthorizeWebService, FakeAutomation::complete());
        let poller = OnboardingPoller::new(bridge.clone(), policy());

        poller.run(&onboarding_request()).await.unwrap();
        assert_eq!(
            bridge.submitted(),
            vec![
                AutomationKind::CreateCertificate,
                AutomationKind::AuthorizeWebService
            ]
        );
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists("Certificate ALREADY EXISTS for alias"));
        assert!(is_already_exists("El certificado ya existe"));
        assert!(!is_already_exists("invalid password"));
    }
}
