//! Per-agency fiscal settings repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, Set, Statement};
use tesoro_core::fiscal::{FiscalSettings, FiscalSettingsStore};
use tesoro_shared::AppResult;
use tesoro_shared::types::AgencyId;

use crate::entities::fiscal_settings;
use crate::error::{RowError, db_err, parse_column};

/// Fiscal settings repository.
#[derive(Debug, Clone)]
pub struct FiscalSettingsRepository {
    db: DatabaseConnection,
}

impl FiscalSettingsRepository {
    /// Creates a new fiscal settings repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(model: fiscal_settings::Model) -> Result<FiscalSettings, RowError> {
    Ok(FiscalSettings {
        agency_id: AgencyId::from_uuid(model.agency_id),
        cuit: model.cuit,
        pto_vta: model.pto_vta,
        environment: parse_column("fiscal_settings", "environment", &model.environment)?,
        cert_alias: model.cert_alias,
        onboarding: parse_column(
            "fiscal_settings",
            "onboarding_status",
            &model.onboarding_status,
        )?,
        onboarding_error: model.onboarding_error,
        onboarding_started_at: model.onboarding_started_at.map(Into::into),
    })
}

#[async_trait]
impl FiscalSettingsStore for FiscalSettingsRepository {
    async fn find(&self, agency_id: AgencyId) -> AppResult<Option<FiscalSettings>> {
        let row = fiscal_settings::Entity::find_by_id(agency_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(to_domain).transpose()?)
    }

    async fn save(&self, settings: &FiscalSettings) -> AppResult<()> {
        let now = Utc::now().into();
        let model = fiscal_settings::ActiveModel {
            agency_id: Set(settings.agency_id.into_inner()),
            cuit: Set(settings.cuit),
            pto_vta: Set(settings.pto_vta),
            environment: Set(settings.environment.as_str().to_string()),
            cert_alias: Set(settings.cert_alias.clone()),
            onboarding_status: Set(settings.onboarding.as_str().to_string()),
            onboarding_error: Set(settings.onboarding_error.clone()),
            onboarding_started_at: Set(settings.onboarding_started_at.map(Into::into)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        fiscal_settings::Entity::insert(model)
            .on_conflict(
                OnConflict::column(fiscal_settings::Column::AgencyId)
                    .update_columns([
                        fiscal_settings::Column::Cuit,
                        fiscal_settings::Column::PtoVta,
                        fiscal_settings::Column::Environment,
                        fiscal_settings::Column::CertAlias,
                        fiscal_settings::Column::OnboardingStatus,
                        fiscal_settings::Column::OnboardingError,
                        fiscal_settings::Column::OnboardingStartedAt,
                        fiscal_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn claim_onboarding(
        &self,
        settings: &FiscalSettings,
        reclaim_before: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r"
                INSERT INTO fiscal_settings (
                    agency_id, cuit, pto_vta, environment, cert_alias,
                    onboarding_status, onboarding_error, onboarding_started_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (agency_id) DO UPDATE SET
                    cuit = EXCLUDED.cuit,
                    pto_vta = EXCLUDED.pto_vta,
                    environment = EXCLUDED.environment,
                    cert_alias = EXCLUDED.cert_alias,
                    onboarding_status = EXCLUDED.onboarding_status,
                    onboarding_error = EXCLUDED.onboarding_error,
                    onboarding_started_at = EXCLUDED.onboarding_started_at
                WHERE fiscal_settings.onboarding_status <> 'in_process'
                   OR fiscal_settings.onboarding_started_at IS NULL
                   OR fiscal_settings.onboarding_started_at < $9
                ",
                [
                    settings.agency_id.into_inner().into(),
                    settings.cuit.into(),
                    settings.pto_vta.into(),
                    settings.environment.as_str().into(),
                    settings.cert_alias.clone().into(),
                    settings.onboarding.as_str().into(),
                    settings.onboarding_error.clone().into(),
                    settings.onboarding_started_at.into(),
                    reclaim_before.into(),
                ],
            ))
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }
}
