//! Background onboarding runs with persisted state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tesoro_shared::types::AgencyId;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};

use super::error::OnboardingError;
use super::poller::OnboardingPoller;
use super::types::{OnboardingRequest, OnboardingState};
use crate::fiscal::{FiscalEnvironment, FiscalSettings, FiscalSettingsStore};

/// Starts onboarding runs as background tasks and records their outcome.
pub struct OnboardingService {
    settings: Arc<dyn FiscalSettingsStore>,
    poller: Arc<OnboardingPoller>,
    /// Runs spawned by this process, by agency.
    runs: Mutex<HashMap<AgencyId, AbortHandle>>,
}

impl OnboardingService {
    /// Creates a new service.
    #[must_use]
    pub fn new(settings: Arc<dyn FiscalSettingsStore>, poller: Arc<OnboardingPoller>) -> Self {
        Self {
            settings,
            poller,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Claims the agency as `in_process` and spawns the run.
    ///
    /// The request handler returns immediately; progress is read back with
    /// [`OnboardingService::status`]. An `in_process` state left by a run that
    /// died is taken over: at once when the run was spawned by this process,
    /// otherwise once it is older than [`PollPolicy::stale_after`].
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if a live run holds the agency, or a storage failure.
    ///
    /// [`PollPolicy::stale_after`]: super::poller::PollPolicy::stale_after
    pub async fn start(
        &self,
        agency_id: AgencyId,
        request: OnboardingRequest,
    ) -> Result<JoinHandle<()>, OnboardingError> {
        let mut runs = self.runs.lock().await;
        let now = Utc::now();
        let reclaim_before = match runs.get(&agency_id) {
            Some(run) if !run.is_finished() => return Err(OnboardingError::AlreadyRunning),
            // Our own run is gone; whatever it left behind is stale.
            Some(_) => now,
            None => self.stale_cutoff(now),
        };

        let settings = FiscalSettings {
            agency_id,
            cuit: request.cuit,
            pto_vta: request.pto_vta,
            environment: FiscalEnvironment::Prod,
            cert_alias: Some(request.alias.clone()),
            onboarding: OnboardingState::InProcess,
            onboarding_error: None,
            onboarding_started_at: Some(now),
        };
        if !self
            .settings
            .claim_onboarding(&settings, reclaim_before)
            .await?
        {
            return Err(OnboardingError::AlreadyRunning);
        }
        info!(%agency_id, cuit = request.cuit, "fiscal onboarding started");

        let store = self.settings.clone();
        let poller = self.poller.clone();
        let handle = tokio::spawn(async move {
            let outcome = poller.run(&request).await;
            let (state, message) = match outcome {
                Ok(_) => (OnboardingState::Complete, None),
                Err(e @ OnboardingError::Timeout { .. }) => {
                    (OnboardingState::Timeout, Some(e.to_string()))
                }
                Err(e) => (OnboardingState::Error, Some(e.to_string())),
            };
            match &message {
                None => info!(%agency_id, "fiscal onboarding complete"),
                Some(m) => warn!(%agency_id, state = state.as_str(), error = %m, "fiscal onboarding ended"),
            }
            let finished = FiscalSettings {
                onboarding: state,
                onboarding_error: message,
                ..settings
            };
            if let Err(e) = store.save(&finished).await {
                error!(%agency_id, error = %e, "could not persist onboarding outcome");
            }
        });
        runs.insert(agency_id, handle.abort_handle());
        Ok(handle)
    }

    fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.poller.policy().stale_after())
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Current settings and onboarding state of the agency.
    ///
    /// # Errors
    ///
    /// Returns a storage failure.
    pub async fn status(&self, agency_id: AgencyId) -> Result<Option<FiscalSettings>, OnboardingError> {
        Ok(self.settings.find(agency_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::poller::PollPolicy;
    use crate::onboarding::types::AutomationKind;
    use crate::testing::{FakeAutomation, InMemoryFiscalSettings, onboarding_request};
    use std::time::Duration;

    fn service(bridge: Arc<FakeAutomation>, settings: Arc<InMemoryFiscalSettings>) -> OnboardingService {
        let poller = OnboardingPoller::new(
            bridge,
            PollPolicy {
                interval: Duration::from_millis(1),
                max_attempts: 2,
            },
        );
        OnboardingService::new(settings, Arc::new(poller))
    }

    #[tokio::test]
    async fn test_successful_run_is_persisted() {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(AutomationKind::CreateCertificate, FakeAutomation::complete());
        bridge.script_submit(AutomationKind::AuthorizeWebService, FakeAutomation::complete());
        let settings = Arc::new(InMemoryFiscalSettings::default());
        let service = service(bridge, settings.clone());
        let agency = AgencyId::new();

        service.start(agency, onboarding_request()).await.unwrap().await.unwrap();

        let stored = service.status(agency).await.unwrap().unwrap();
        assert_eq!(stored.onboarding, OnboardingState::Complete);
        assert_eq!(stored.environment, FiscalEnvironment::Prod);
        assert_eq!(stored.cert_alias.as_deref(), Some("tesoro"));
    }

    #[tokio::test]
    async fn test_timeout_is_persisted() {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(AutomationKind::CreateCertificate, FakeAutomation::running("job"));
        let settings = Arc::new(InMemoryFiscalSettings::default());
        let service = service(bridge, settings);
        let agency = AgencyId::new();

        service.start(agency, onboarding_request()).await.unwrap().await.unwrap();

        let stored = service.status(agency).await.unwrap().unwrap();
        assert_eq!(stored.onboarding, OnboardingState::Timeout);
        assert!(stored.onboarding_error.is_some());
    }

    fn slow_service(
        bridge: Arc<FakeAutomation>,
        settings: Arc<InMemoryFiscalSettings>,
    ) -> Arc<OnboardingService> {
        let poller = OnboardingPoller::new(
            bridge,
            PollPolicy {
                interval: Duration::from_secs(60),
                max_attempts: 10,
            },
        );
        Arc::new(OnboardingService::new(settings, Arc::new(poller)))
    }

    fn stuck_bridge() -> Arc<FakeAutomation> {
        let bridge = Arc::new(FakeAutomation::new());
        bridge.script_submit(AutomationKind::CreateCertificate, FakeAutomation::running("job"));
        bridge
    }

    #[tokio::test]
    async fn test_aborted_run_can_be_restarted() {
        let settings = Arc::new(InMemoryFiscalSettings::default());
        let service = slow_service(stuck_bridge(), settings);
        let agency = AgencyId::new();

        let first = service.start(agency, onboarding_request()).await.unwrap();
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(
            service.status(agency).await.unwrap().unwrap().onboarding,
            OnboardingState::InProcess
        );

        let second = service.start(agency, onboarding_request()).await.unwrap();
        second.abort();
    }

    #[tokio::test]
    async fn test_stale_claim_from_dead_process_is_taken_over() {
        let settings = Arc::new(InMemoryFiscalSettings::default());
        let agency = AgencyId::new();
        settings.set_claim(
            agency,
            OnboardingState::InProcess,
            Utc::now() - TimeDelta::days(1),
        );
        let service = slow_service(stuck_bridge(), settings);

        let run = service.start(agency, onboarding_request()).await.unwrap();
        let stored = service.status(agency).await.unwrap().unwrap();
        assert_eq!(stored.onboarding, OnboardingState::InProcess);
        assert!(stored.onboarding_started_at.unwrap() > Utc::now() - TimeDelta::minutes(1));
        run.abort();
    }

    #[tokio::test]
    async fn test_concurrent_starts_claim_once() {
        let settings = Arc::new(InMemoryFiscalSettings::default());
        let service = slow_service(stuck_bridge(), settings);
        let agency = AgencyId::new();

        let (a, b) = tokio::join!(
            service.start(agency, onboarding_request()),
            service.start(agency, onboarding_request()),
        );
        let (started, rejected): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(Result::is_ok);
        assert_eq!(started.len(), 1);
        assert!(matches!(rejected[0], Err(OnboardingError::AlreadyRunning)));
        for run in started.into_iter().flatten() {
            run.abort();
        }
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_rejected() {
        let bridge = Arc::new(FakeAutomation::new());
        let settings = Arc::new(InMemoryFiscalSettings::default());
        let agency = AgencyId::new();
        settings.set_state(agency, OnboardingState::InProcess);
        let service = service(bridge, settings);

        let err = service.start(agency, onboarding_request()).await.unwrap_err();
        assert!(matches!(err, OnboardingError::AlreadyRunning));
    }
}
