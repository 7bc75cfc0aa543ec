//! Card-board REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tesoro_core::cardboard::{CardBoardApi, RemoteCard};
use tesoro_shared::AppResult;
use tesoro_shared::config::CardBoardConfig;
use tracing::instrument;

use crate::http::{build_client, json_or_not_found, transport_error};

const SERVICE: &str = "card board";

/// Fields requested for a card.
const CARD_FIELDS: &str = "id,name,desc,idList,idBoard,closed,url";

/// Fetches cards with key/token query authentication.
#[derive(Debug, Clone)]
pub struct TrelloClient {
    http: Client,
    api_base: String,
    api_key: String,
    token: String,
}

impl TrelloClient {
    /// Creates a client from configuration.
    pub fn new(config: &CardBoardConfig, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token: config.token.clone(),
        })
    }

    fn card_url(&self, card_id: &str) -> String {
        format!("{}/cards/{card_id}", self.api_base)
    }
}

#[async_trait]
impl CardBoardApi for TrelloClient {
    #[instrument(skip(self))]
    async fn fetch_card(&self, card_id: &str) -> AppResult<Option<RemoteCard>> {
        let response = self
            .http
            .get(self.card_url(card_id))
            .query(&[
                ("key", self.api_key.as_str()),
                ("token", self.token.as_str()),
                ("fields", CARD_FIELDS),
            ])
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        json_or_not_found(SERVICE, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_url_trims_base() {
        let client = TrelloClient::new(
            &CardBoardConfig {
                api_base: "https://api.trello.com/1/".into(),
                ..CardBoardConfig::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.card_url("c1"), "https://api.trello.com/1/cards/c1");
    }

    #[test]
    fn test_card_body_decodes() {
        let card: RemoteCard = serde_json::from_str(
            r#"{"id":"c1","name":"Familia Pérez","desc":"Bariloche","idList":"l1","idBoard":"b1","closed":false,"url":"https://trello.com/c/c1"}"#,
        )
        .unwrap();
        assert_eq!(card.id_list, "l1");
        assert!(!card.closed);
    }
}
