//! Card-board payloads and board settings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tesoro_shared::types::AgencyId;

/// What a board action did to a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardEventKind {
    /// `createCard`, `copyCard`, `moveCardToBoard`.
    Created,
    /// `updateCard` that did not archive.
    Updated,
    /// `updateCard` with `closed = true`.
    Archived,
    /// `deleteCard`, `moveCardFromBoard`.
    Deleted,
    /// Not about a card's lifecycle.
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionCard {
    id: Option<String>,
    #[serde(default)]
    closed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ActionRef {
    id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ActionData {
    #[serde(default)]
    card: Option<ActionCard>,
    #[serde(default)]
    board: Option<ActionRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct ActionBody {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: ActionData,
}

#[derive(Debug, Clone, Deserialize)]
struct WebhookBody {
    action: ActionBody,
    #[serde(default)]
    model: Option<ActionRef>,
}

/// A board action, reduced to what ingestion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardAction {
    /// Action id; the idempotency key.
    pub id: String,
    /// Raw action type.
    pub action_type: String,
    /// Board the action happened on.
    pub board_id: Option<String>,
    /// Card the action is about.
    pub card_id: Option<String>,
    /// Interpreted kind.
    pub kind: CardEventKind,
}

impl CardAction {
    /// Parses a webhook body.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the body is not a board action.
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let body: WebhookBody = serde_json::from_slice(body)?;
        let card = body.action.data.card.unwrap_or_default();
        let kind = match body.action.kind.as_str() {
            "createCard" | "copyCard" | "moveCardToBoard" | "convertToCardFromCheckItem" => {
                CardEventKind::Created
            }
            "updateCard" if card.closed == Some(true) => CardEventKind::Archived,
            "updateCard" => CardEventKind::Updated,
            "deleteCard" | "moveCardFromBoard" => CardEventKind::Deleted,
            _ => CardEventKind::Other,
        };
        Ok(Self {
            id: body.action.id,
            action_type: body.action.kind,
            board_id: body
                .action
                .data
                .board
                .and_then(|b| b.id)
                .or_else(|| body.model.and_then(|m| m.id)),
            card_id: card.id,
            kind,
        })
    }
}

/// A card as returned by the board API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCard {
    /// Card id.
    pub id: String,
    /// Title.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub desc: String,
    /// Current list.
    pub id_list: String,
    /// Current board.
    pub id_board: String,
    /// Archived.
    #[serde(default)]
    pub closed: bool,
    /// Link to the card.
    #[serde(default)]
    pub url: Option<String>,
}

/// How a board maps into an agency's CRM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSettings {
    /// Owning agency.
    pub agency_id: AgencyId,
    /// Board id.
    pub board_id: String,
    /// List id → lead status.
    pub list_status: HashMap<String, String>,
}

impl BoardSettings {
    /// Lead status for a list, if mapped.
    #[must_use]
    pub fn status_for(&self, list_id: &str) -> Option<&str> {
        self.list_status.get(list_id).map(String::as_str)
    }
}

/// Lead fields taken from a remote card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFromCard {
    /// Agency.
    pub agency_id: AgencyId,
    /// Card id.
    pub card_id: String,
    /// Board id.
    pub board_id: String,
    /// List id.
    pub list_id: String,
    /// Lead name.
    pub name: String,
    /// Notes.
    pub description: String,
    /// Status mapped from the list.
    pub status: Option<String>,
    /// Card URL.
    pub url: Option<String>,
}

impl LeadFromCard {
    /// Builds the lead from a card under the board's mapping.
    #[must_use]
    pub fn from_card(settings: &BoardSettings, card: &RemoteCard) -> Self {
        Self {
            agency_id: settings.agency_id,
            card_id: card.id.clone(),
            board_id: card.id_board.clone(),
            list_id: card.id_list.clone(),
            name: card.name.clone(),
            description: card.desc.clone(),
            status: settings.status_for(&card.id_list).map(str::to_string),
            url: card.url.clone(),
        }
    }
}
