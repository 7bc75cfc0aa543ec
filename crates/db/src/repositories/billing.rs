//! Billing events and subscriptions.
//!
//! `billing_events.dedup_id` is generated by the database from the payment,
//! notification and preapproval ids, in that order. The unique
//! `(event_type, dedup_id)` index makes recording an event idempotent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use tesoro_core::billing::{BillingEvent, BillingStore, Subscription};
use tesoro_shared::types::{AgencyId, SubscriptionId};
use tesoro_shared::{AppError, AppResult};
use tracing::debug;

use crate::entities::{billing_events, subscriptions};
use crate::error::{RowError, db_err, parse_column};

/// Billing repository.
#[derive(Debug, Clone)]
pub struct BillingRepository {
    db: DatabaseConnection,
}

impl BillingRepository {
    /// Creates a new billing repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a subscription.
    pub async fn insert_subscription(&self, subscription: &Subscription) -> AppResult<()> {
        let mut model = subscription_to_active(subscription);
        model.created_at = Set(Utc::now().into());
        subscriptions::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn utc(value: Option<sea_orm::prelude::DateTimeWithTimeZone>) -> Option<DateTime<Utc>> {
    value.map(|v| v.with_timezone(&Utc))
}

fn subscription_to_domain(model: subscriptions::Model) -> Result<Subscription, RowError> {
    Ok(Subscription {
        id: SubscriptionId::from_uuid(model.id),
        agency_id: AgencyId::from_uuid(model.agency_id),
        plan_id: model.plan_id,
        status: parse_column("subscriptions", "status", &model.status)?,
        mp_preapproval_id: model.mp_preapproval_id,
        mp_status: model.mp_status,
        current_period_start: utc(model.current_period_start),
        current_period_end: utc(model.current_period_end),
        trial_start: utc(model.trial_start),
        trial_end: utc(model.trial_end),
        payment_attempts: model.payment_attempts,
    })
}

/// Every column but `created_at`.
fn subscription_to_active(subscription: &Subscription) -> subscriptions::ActiveModel {
    subscriptions::ActiveModel {
        id: Set(subscription.id.into_inner()),
        agency_id: Set(subscription.agency_id.into_inner()),
        plan_id: Set(subscription.plan_id.clone()),
        status: Set(subscription.status.as_str().to_string()),
        mp_preapproval_id: Set(subscription.mp_preapproval_id.clone()),
        mp_status: Set(subscription.mp_status.clone()),
        current_period_start: Set(subscription.current_period_start.map(Into::into)),
        current_period_end: Set(subscription.current_period_end.map(Into::into)),
        trial_start: Set(subscription.trial_start.map(Into::into)),
        trial_end: Set(subscription.trial_end.map(Into::into)),
        payment_attempts: Set(subscription.payment_attempts),
        created_at: NotSet,
        updated_at: Set(Utc::now().into()),
    }
}

fn event_to_active(event: &BillingEvent) -> billing_events::ActiveModel {
    billing_events::ActiveModel {
        id: Set(event.id.into_inner()),
        agency_id: Set(event.agency_id.map(AgencyId::into_inner)),
        subscription_id: Set(event.subscription_id.map(SubscriptionId::into_inner)),
        event_type: Set(event.event_type.clone()),
        mp_payment_id: Set(event.mp_payment_id.clone()),
        mp_notification_id: Set(event.mp_notification_id.clone()),
        mp_preapproval_id: Set(event.mp_preapproval_id.clone()),
        // Generated column
        dedup_id: NotSet,
        amount: Set(event.amount),
        payload: Set(event.payload.clone()),
        created_at: Set(event.created_at.into()),
    }
}

#[async_trait]
impl BillingStore for BillingRepository {
    async fn event_exists(&self, event_type: &str, external_id: &str) -> AppResult<bool> {
        let count = billing_events::Entity::find()
            .filter(billing_events::Column::EventType.eq(event_type))
            .filter(billing_events::Column::DedupId.eq(external_id))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    async fn record_event(
        &self,
        event: &BillingEvent,
        subscription: Option<&Subscription>,
    ) -> AppResult<bool> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let inserted = billing_events::Entity::insert(event_to_active(event))
            .on_conflict(
                OnConflict::columns([
                    billing_events::Column::EventType,
                    billing_events::Column::DedupId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(db_err)?;

        if inserted == 0 {
            txn.rollback().await.map_err(db_err)?;
            debug!(event_type = %event.event_type, "billing event already recorded");
            return Ok(false);
        }

        if let Some(subscription) = subscription {
            let result = subscriptions::Entity::update_many()
                .set(subscription_to_active(subscription))
                .filter(subscriptions::Column::Id.eq(subscription.id.into_inner()))
                .filter(subscriptions::Column::AgencyId.eq(subscription.agency_id.into_inner()))
                .exec(&txn)
                .await
                .map_err(db_err)?;
            if result.rows_affected == 0 {
                txn.rollback().await.map_err(db_err)?;
                return Err(AppError::NotFound(format!(
                    "Subscription {} not found",
                    subscription.id
                )));
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn find_subscription_by_preapproval(
        &self,
        preapproval_id: &str,
    ) -> AppResult<Option<Subscription>> {
        let row = subscriptions::Entity::find()
            .filter(subscriptions::Column::MpPreapprovalId.eq(preapproval_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(subscription_to_domain).transpose()?)
    }

    async fn find_subscription_by_agency(
        &self,
        agency_id: AgencyId,
    ) -> AppResult<Option<Subscription>> {
        let row = subscriptions::Entity::find()
            .filter(subscriptions::Column::AgencyId.eq(agency_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(subscription_to_domain).transpose()?)
    }
}
