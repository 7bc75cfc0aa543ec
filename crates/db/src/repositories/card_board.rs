//! Card-board sync: board settings, applied actions and card-linked leads.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use tesoro_core::cardboard::{BoardSettings, CardBoardStore, LeadFromCard};
use tesoro_shared::AppResult;
use tesoro_shared::types::{AgencyId, LeadId};

use crate::entities::{card_board_actions, card_board_settings, leads};
use crate::error::{RowError, db_err, from_json, to_json};

/// Card-board repository.
#[derive(Debug, Clone)]
pub struct CardBoardRepository {
    db: DatabaseConnection,
}

impl CardBoardRepository {
    /// Creates a new card-board repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Links a board to an agency with its list mapping.
    pub async fn save_board_settings(&self, settings: &BoardSettings) -> AppResult<()> {
        let now = Utc::now().into();
        let model = card_board_settings::ActiveModel {
            board_id: Set(settings.board_id.clone()),
            agency_id: Set(settings.agency_id.into_inner()),
            list_status: Set(to_json(&settings.list_status)?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        card_board_settings::Entity::insert(model)
            .on_conflict(
                OnConflict::column(card_board_settings::Column::BoardId)
                    .update_columns([
                        card_board_settings::Column::AgencyId,
                        card_board_settings::Column::ListStatus,
                        card_board_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn settings_to_domain(model: card_board_settings::Model) -> Result<BoardSettings, RowError> {
    Ok(BoardSettings {
        agency_id: AgencyId::from_uuid(model.agency_id),
        board_id: model.board_id,
        list_status: from_json("card_board_settings", "list_status", model.list_status)?,
    })
}

#[async_trait]
impl CardBoardStore for CardBoardRepository {
    async fn settings_for_board(&self, board_id: &str) -> AppResult<Option<BoardSettings>> {
        let row = card_board_settings::Entity::find_by_id(board_id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.map(settings_to_domain).transpose()?)
    }

    async fn action_processed(&self, action_id: &str) -> AppResult<bool> {
        let count = card_board_actions::Entity::find()
            .filter(card_board_actions::Column::ActionId.eq(action_id))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    async fn mark_action_processed(
        &self,
        agency_id: AgencyId,
        action_id: &str,
        action_type: &str,
    ) -> AppResult<()> {
        let model = card_board_actions::ActiveModel {
            action_id: Set(action_id.to_string()),
            agency_id: Set(agency_id.into_inner()),
            action_type: Set(action_type.to_string()),
            processed_at: Set(Utc::now().into()),
        };
        card_board_actions::Entity::insert(model)
            .on_conflict(
                OnConflict::column(card_board_actions::Column::ActionId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn upsert_lead_from_card(&self, lead: &LeadFromCard) -> AppResult<LeadId> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now().into();

        let existing = leads::Entity::find()
            .filter(leads::Column::AgencyId.eq(lead.agency_id.into_inner()))
            .filter(leads::Column::ExternalCardId.eq(lead.card_id.as_str()))
            .one(&txn)
            .await
            .map_err(db_err)?;

        let id = if let Some(row) = existing {
            let id = row.id;
            let mut active: leads::ActiveModel = row.into();
            active.name = Set(lead.name.clone());
            active.description = Set(lead.description.clone());
            active.external_board_id = Set(Some(lead.board_id.clone()));
            active.external_list_id = Set(Some(lead.list_id.clone()));
            active.external_url = Set(lead.url.clone());
            // An unmapped list keeps the current status
            if let Some(status) = &lead.status {
                active.status = Set(Some(status.clone()));
            }
            active.updated_at = Set(now);
            active.update(&txn).await.map_err(db_err)?;
            LeadId::from_uuid(id)
        } else {
            let id = LeadId::new();
            let model = leads::ActiveModel {
                id: Set(id.into_inner()),
                agency_id: Set(lead.agency_id.into_inner()),
                name: Set(lead.name.clone()),
                description: Set(lead.description.clone()),
                status: Set(lead.status.clone()),
                external_card_id: Set(Some(lead.card_id.clone())),
                external_board_id: Set(Some(lead.board_id.clone())),
                external_list_id: Set(Some(lead.list_id.clone())),
                external_url: Set(lead.url.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            leads::Entity::insert(model)
                .exec_without_returning(&txn)
                .await
                .map_err(db_err)?;
            id
        };

        txn.commit().await.map_err(db_err)?;
        Ok(id)
    }

    async fn delete_lead_by_card(&self, agency_id: AgencyId, card_id: &str) -> AppResult<bool> {
        let result = leads::Entity::delete_many()
            .filter(leads::Column::AgencyId.eq(agency_id.into_inner()))
            .filter(leads::Column::ExternalCardId.eq(card_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }
}
