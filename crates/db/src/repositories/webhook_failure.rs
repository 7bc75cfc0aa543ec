//! Durable log of webhooks that could not be applied.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};
use tesoro_core::webhook::{WebhookFailure, WebhookFailureLog};
use tesoro_shared::AppResult;
use uuid::Uuid;

use crate::entities::webhook_failures;
use crate::error::db_err;

/// Webhook failure repository.
#[derive(Debug, Clone)]
pub struct WebhookFailureRepository {
    db: DatabaseConnection,
}

impl WebhookFailureRepository {
    /// Creates a new webhook failure repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Most recent failures first.
    pub async fn recent(&self, limit: u64) -> AppResult<Vec<webhook_failures::Model>> {
        webhook_failures::Entity::find()
            .order_by_desc(webhook_failures::Column::OccurredAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl WebhookFailureLog for WebhookFailureRepository {
    async fn record(&self, failure: &WebhookFailure) -> AppResult<()> {
        let model = webhook_failures::ActiveModel {
            id: Set(Uuid::now_v7()),
            source: Set(failure.source.as_str().to_string()),
            event_type: Set(failure.event_type.clone()),
            external_id: Set(failure.external_id.clone()),
            error: Set(failure.error.clone()),
            payload: Set(failure.payload.clone()),
            occurred_at: Set(failure.occurred_at.into()),
        };
        webhook_failures::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
