//! Persistence port for card-board sync.

use async_trait::async_trait;
use tesoro_shared::AppResult;
use tesoro_shared::types::{AgencyId, LeadId};

use super::types::{BoardSettings, LeadFromCard};

/// Board settings, processed actions and leads.
#[async_trait]
pub trait CardBoardStore: Send + Sync {
    /// Settings of the agency that owns a board.
    async fn settings_for_board(&self, board_id: &str) -> AppResult<Option<BoardSettings>>;

    /// Whether an action was already applied.
    async fn action_processed(&self, action_id: &str) -> AppResult<bool>;

    /// Records an applied action.
    async fn mark_action_processed(
        &self,
        agency_id: AgencyId,
        action_id: &str,
        action_type: &str,
    ) -> AppResult<()>;

    /// Inserts or updates the lead linked to a card.
    async fn upsert_lead_from_card(&self, lead: &LeadFromCard) -> AppResult<LeadId>;

    /// Deletes the lead linked to a card. Returns false if there was none.
    async fn delete_lead_by_card(&self, agency_id: AgencyId, card_id: &str) -> AppResult<bool>;
}
