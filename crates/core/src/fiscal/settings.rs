//! Per-agency fiscal settings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tesoro_shared::AppResult;
use tesoro_shared::types::AgencyId;

use crate::onboarding::OnboardingState;

/// Authority environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiscalEnvironment {
    /// Homologation.
    #[default]
    Dev,
    /// Production.
    Prod,
}

impl FiscalEnvironment {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl std::str::FromStr for FiscalEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            _ => Err(format!("Unknown fiscal environment: {s}")),
        }
    }
}

/// What the bridge needs to act on behalf of an agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalCredentials {
    /// Taxpayer id.
    pub cuit: i64,
    /// Environment.
    pub environment: FiscalEnvironment,
    /// Certificate alias created during onboarding.
    pub cert_alias: Option<String>,
}

/// Fiscal configuration of an agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalSettings {
    /// Agency.
    pub agency_id: AgencyId,
    /// Taxpayer id.
    pub cuit: i64,
    /// Default point of sale.
    pub pto_vta: i32,
    /// Environment.
    pub environment: FiscalEnvironment,
    /// Certificate alias.
    pub cert_alias: Option<String>,
    /// Onboarding progress.
    pub onboarding: OnboardingState,
    /// Message of the last onboarding failure.
    pub onboarding_error: Option<String>,
    /// When the current or last onboarding run was claimed.
    pub onboarding_started_at: Option<DateTime<Utc>>,
}

impl FiscalSettings {
    /// Credentials for bridge calls.
    #[must_use]
    pub fn credentials(&self) -> FiscalCredentials {
        FiscalCredentials {
            cuit: self.cuit,
            environment: self.environment,
            cert_alias: self.cert_alias.clone(),
        }
    }
}

/// Storage of fiscal settings.
#[async_trait]
pub trait FiscalSettingsStore: Send + Sync {
    /// Finds the settings of an agency.
    async fn find(&self, agency_id: AgencyId) -> AppResult<Option<FiscalSettings>>;

    /// Inserts or replaces the settings of an agency.
    async fn save(&self, settings: &FiscalSettings) -> AppResult<()>;

    /// Saves `settings` (an `in_process` claim) unless a run claimed at or
    /// after `reclaim_before` is still `in_process`. Returns whether the
    /// claim was taken. Check and write are one atomic step.
    async fn claim_onboarding(
        &self,
        settings: &FiscalSettings,
        reclaim_before: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// Whether an `in_process` claim blocks a new one.
#[must_use]
pub fn blocks_new_claim(existing: &FiscalSettings, reclaim_before: DateTime<Utc>) -> bool {
    existing.onboarding == OnboardingState::InProcess
        && existing
            .onboarding_started_at
            .is_some_and(|started| started >= reclaim_before)
}
