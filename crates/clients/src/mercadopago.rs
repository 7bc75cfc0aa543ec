//! Payment provider REST client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tesoro_core::billing::{PaymentProvider, ProviderPayment, ProviderPreapproval};
use tesoro_shared::{AppError, AppResult};
use tesoro_shared::config::BillingConfig;
use tracing::{debug, instrument};

use crate::http::{
    build_client, decimal_from_json, json_or_not_found, string_from_json as text,
    transport_error,
};

const SERVICE: &str = "payment provider";

/// Reads payments and preapprovals with a bearer access token.
#[derive(Debug, Clone)]
pub struct MercadoPagoClient {
    http: Client,
    api_base: String,
    access_token: String,
}

impl MercadoPagoClient {
    /// Creates a client from configuration.
    pub fn new(config: &BillingConfig, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        json_or_not_found(SERVICE, response).await
    }
}

fn malformed(what: &str) -> AppError {
    AppError::ExternalService(format!("{SERVICE} sent a {what} without id or status"))
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Subscription charges carry the preapproval id in the metadata or in the
/// point-of-interaction block.
pub(crate) fn parse_payment(body: &Value) -> Option<ProviderPayment> {
    let preapproval_id = text(&body["metadata"]["preapproval_id"])
        .or_else(|| text(&body["point_of_interaction"]["transaction_data"]["subscription_id"]))
        .or_else(|| text(&body["preapproval_id"]));

    Some(ProviderPayment {
        id: text(&body["id"])?,
        status: text(&body["status"])?,
        preapproval_id,
        external_reference: text(&body["external_reference"]),
        transaction_amount: decimal_from_json(&body["transaction_amount"]),
        currency_id: text(&body["currency_id"]),
        date_approved: timestamp(&body["date_approved"]),
    })
}

pub(crate) fn parse_preapproval(body: &Value) -> Option<ProviderPreapproval> {
    Some(ProviderPreapproval {
        id: text(&body["id"])?,
        status: text(&body["status"])?,
        external_reference: text(&body["external_reference"]),
        next_payment_date: timestamp(&body["next_payment_date"]),
    })
}

#[async_trait]
impl PaymentProvider for MercadoPagoClient {
    #[instrument(skip(self))]
    async fn get_payment(&self, id: &str) -> AppResult<Option<ProviderPayment>> {
        let Some(body) = self.get(&format!("/v1/payments/{id}")).await? else {
            debug!("payment unknown to provider");
            return Ok(None);
        };
        parse_payment(&body)
            .map(Some)
            .ok_or_else(|| malformed("payment"))
    }

    #[instrument(skip(self))]
    async fn get_preapproval(&self, id: &str) -> AppResult<Option<ProviderPreapproval>> {
        let Some(body) = self.get(&format!("/preapproval/{id}")).await? else {
            debug!("preapproval unknown to provider");
            return Ok(None);
        };
        parse_preapproval(&body)
            .map(Some)
            .ok_or_else(|| malformed("preapproval"))
    }
}
