//! Port to the card-board REST API.

use async_trait::async_trait;
use tesoro_shared::AppResult;

use super::types::RemoteCard;

/// Reads current card state.
#[async_trait]
pub trait CardBoardApi: Send + Sync {
    /// Fetches a card; `None` when the API answers 404.
    async fn fetch_card(&self, card_id: &str) -> AppResult<Option<RemoteCard>>;
}
