//! Card-board webhook ingestion.

use std::sync::Arc;

use tesoro_shared::AppResult;
use tracing::{debug, info, instrument};

use super::api::CardBoardApi;
use super::signature::verify_card_signature;
use super::store::CardBoardStore;
use super::types::{BoardSettings, CardAction, CardEventKind, LeadFromCard};
use crate::webhook::{
    IngestOutcome, WebhookError, WebhookFailure, WebhookFailureLog, WebhookSource, admit,
    log_failure,
};

/// A raw webhook delivery.
#[derive(Debug, Clone, Default)]
pub struct CardWebhookRequest {
    /// Raw body.
    pub body: Vec<u8>,
    /// `x-trello-webhook` header.
    pub signature: Option<String>,
}

/// Ingests card actions into CRM leads.
pub struct CardBoardWebhookIngestor {
    store: Arc<dyn CardBoardStore>,
    api: Arc<dyn CardBoardApi>,
    failures: Arc<dyn WebhookFailureLog>,
    secret: Option<String>,
    callback_url: Option<String>,
    production: bool,
}

impl CardBoardWebhookIngestor {
    /// Creates a new ingestor.
    #[must_use]
    pub fn new(
        store: Arc<dyn CardBoardStore>,
        api: Arc<dyn CardBoardApi>,
        failures: Arc<dyn WebhookFailureLog>,
        secret: Option<String>,
        callback_url: Option<String>,
        production: bool,
    ) -> Self {
        Self {
            store,
            api,
            failures,
            secret,
            callback_url,
            production,
        }
    }

    /// Verifies and applies one delivery.
    ///
    /// An empty body is a registration probe and is acknowledged as is.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` when the signature is rejected.
    #[instrument(skip_all)]
    pub async fn ingest(
        &self,
        request: &CardWebhookRequest,
    ) -> Result<IngestOutcome, WebhookError> {
        if request.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(IngestOutcome::Ignored("probe".into()));
        }

        let check = verify_card_signature(
            self.secret.as_deref(),
            request.signature.as_deref(),
            &request.body,
            self.callback_url.as_deref(),
        );
        admit(WebhookSource::CardBoard, &check, self.production)?;

        let action = match CardAction::parse(&request.body) {
            Ok(action) => action,
            Err(e) => {
                let failure = WebhookFailure::new(
                    WebhookSource::CardBoard,
                    &request.body,
                    format!("invalid payload: {e}"),
                );
                log_failure(self.failures.as_ref(), failure).await;
                return Ok(IngestOutcome::Failed("invalid payload".into()));
            }
        };

        match self.apply(&action).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let mut failure =
                    WebhookFailure::new(WebhookSource::CardBoard, &request.body, e.to_string())
                        .with_event_type(action.action_type.clone());
                if let Some(card_id) = &action.card_id {
                    failure = failure.with_external_id(card_id.clone());
                }
                log_failure(self.failures.as_ref(), failure).await;
                Ok(IngestOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn apply(&self, action: &CardAction) -> AppResult<IngestOutcome> {
        if action.kind == CardEventKind::Other {
            debug!(action_type = %action.action_type, "ignoring board action");
            return Ok(IngestOutcome::Ignored(format!(
                "unhandled action {}",
                action.action_type
            )));
        }
        let Some(card_id) = action.card_id.as_deref() else {
            return Ok(IngestOutcome::Ignored("action without card".into()));
        };
        let Some(board_id) = action.board_id.as_deref() else {
            return Ok(IngestOutcome::Ignored("action without board".into()));
        };
        if self.store.action_processed(&action.id).await? {
            return Ok(IngestOutcome::Duplicate);
        }
        let Some(settings) = self.store.settings_for_board(board_id).await? else {
            return Ok(IngestOutcome::Ignored(format!("board {board_id} not configured")));
        };

        self.sync_card(&settings, card_id, action.kind).await?;
        self.store
            .mark_action_processed(settings.agency_id, &action.id, &action.action_type)
            .await?;
        Ok(IngestOutcome::Applied)
    }

    /// Writes the lead from the card's current remote state.
    async fn sync_card(
        &self,
        settings: &BoardSettings,
        card_id: &str,
        kind: CardEventKind,
    ) -> AppResult<()> {
        let agency_id = settings.agency_id;
        let card = if kind == CardEventKind::Deleted {
            None
        } else {
            self.api.fetch_card(card_id).await?
        };

        match card {
            Some(card) if !card.closed && card.id_board == settings.board_id => {
                let lead_id = self
                    .store
                    .upsert_lead_from_card(&LeadFromCard::from_card(settings, &card))
                    .await?;
                info!(%agency_id, card_id, %lead_id, "lead synced from card");
            }
            _ => {
                let deleted = self.store.delete_lead_by_card(agency_id, card_id).await?;
                info!(%agency_id, card_id, deleted, "card gone, lead removed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardboard::signature::compute_card_signature;
    use crate::cardboard::types::RemoteCard;
    use crate::testing::{FakeCardBoardApi, InMemoryCardBoard, InMemoryFailureLog};
    use tesoro_shared::AppError;
    use tesoro_shared::types::AgencyId;

    const SECRET: &str = "board-secret";

    struct Fixture {
        store: Arc<InMemoryCardBoard>,
        api: Arc<FakeCardBoardApi>,
        failures: Arc<InMemoryFailureLog>,
        ingestor: CardBoardWebhookIngestor,
        agency_id: AgencyId,
    }

    fn fixture(production: bool) -> Fixture {
        let agency_id = AgencyId::new();
        let store = Arc::new(InMemoryCardBoard::default());
        store.configure_board(agency_id, "b1", &[("l-new", "NEW"), ("l-won", "WON")]);
        let api = Arc::new(FakeCardBoardApi::default());
        let failures = Arc::new(InMemoryFailureLog::default());
        let ingestor = CardBoardWebhookIngestor::new(
            store.clone(),
            api.clone(),
            failures.clone(),
            Some(SECRET.into()),
            None,
            production,
        );
        Fixture {
            store,
            api,
            failures,
            ingestor,
            agency_id,
        }
    }

    fn card(list: &str, closed: bool) -> RemoteCard {
        RemoteCard {
            id: "c1".into(),
            name: "Familia Pérez".into(),
            desc: "2 adultos".into(),
            id_list: list.into(),
            id_board: "b1".into(),
            closed,
            url: None,
        }
    }

    fn request(action_id: &str, kind: &str) -> CardWebhookRequest {
        let body = format!(
            r#"{{"action":{{"id":"{action_id}","type":"{kind}","data":{{"card":{{"id":"c1"}},"board":{{"id":"b1"}}}}}}}}"#
        );
        let signature = compute_card_signature(SECRET, body.as_bytes(), None);
        CardWebhookRequest {
            body: body.into_bytes(),
            signature: Some(signature),
        }
    }

    #[tokio::test]
    async fn test_probe_is_acknowledged() {
        let f = fixture(true);
        let outcome = f.ingestor.ingest(&CardWebhookRequest::default()).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Ignored("probe".into()));
    }

    #[tokio::test]
    async fn test_created_card_upserts_lead_from_remote_state() {
        let f = fixture(true);
        f.api.put_card(card("l-won", false));

        let outcome = f.ingestor.ingest(&request("a1", "createCard")).await.unwrap();

        assert_eq!(outcome, IngestOutcome::Applied);
        let lead = f.store.lead(f.agency_id, "c1").unwrap();
        assert_eq!(lead.status.as_deref(), Some("WON"));
        assert_eq!(lead.name, "Familia Pérez");
    }

    #[tokio::test]
    async fn test_duplicate_action_is_applied_once() {
        let f = fixture(true);
        f.api.put_card(card("l-new", false));
        f.ingestor.ingest(&request("a1", "updateCard")).await.unwrap();
        let outcome = f.ingestor.ingest(&request("a1", "updateCard")).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Duplicate);
        assert_eq!(f.api.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_update_after_archive_deletes_lead() {
        let f = fixture(true);
        f.api.put_card(card("l-new", false));
        f.ingestor.ingest(&request("a1", "createCard")).await.unwrap();
        assert!(f.store.lead(f.agency_id, "c1").is_some());

        // The update arrives after the card was archived remotely.
        f.api.put_card(card("l-new", true));
        f.ingestor.ingest(&request("a2", "updateCard")).await.unwrap();
        assert!(f.store.lead(f.agency_id, "c1").is_none());
    }

    #[tokio::test]
    async fn test_missing_remote_card_deletes_lead() {
        let f = fixture(true);
        f.api.put_card(card("l-new", false));
        f.ingestor.ingest(&request("a1", "createCard")).await.unwrap();
        f.api.remove_card("c1");

        let outcome = f.ingestor.ingest(&request("a2", "updateCard")).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Applied);
        assert!(f.store.lead(f.agency_id, "c1").is_none());
    }

    #[tokio::test]
    async fn test_unknown_board_is_ignored() {
        let f = fixture(true);
        let body = br#"{"action":{"id":"a1","type":"createCard","data":{"card":{"id":"c1"},"board":{"id":"other"}}}}"#;
        let request = CardWebhookRequest {
            body: body.to_vec(),
            signature: Some(compute_card_signature(SECRET, body, None)),
        };
        let outcome = f.ingestor.ingest(&request).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Ignored(_)));
        assert!(!f.store.action_processed("a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_in_production() {
        let f = fixture(true);
        let mut request = request("a1", "createCard");
        request.signature = Some("AAAA".into());
        let err = f.ingestor.ingest(&request).await.unwrap_err();
        assert_eq!(AppError::from(err).status_code(), 401);
        assert!(!f.store.action_processed("a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_api_failure_is_logged_and_not_marked() {
        let f = fixture(false);
        f.api.fail_with("board api down");
        let outcome = f.ingestor.ingest(&request("a1", "updateCard")).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Failed(_)));
        assert_eq!(f.failures.entries().len(), 1);
        assert_eq!(f.failures.entries()[0].external_id.as_deref(), Some("c1"));
        assert!(!f.store.action_processed("a1").await.unwrap());
    }
}
