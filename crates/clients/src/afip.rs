//! Fiscal RPC bridge client.
//!
//! Web-service calls go through `POST /afip/requests` with an access ticket
//! from `POST /afip/auth`; tickets are cached per (CUIT, environment) until
//! shortly before they expire. Onboarding automations are started with
//! `POST /automations` and polled with `GET /automations/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde_json::{Value, json};
use tesoro_core::fiscal::{
    AuthorityMessage, AuthorityResponse, FiscalBridge, FiscalCredentials, VoucherRequest,
    VoucherType,
};
use tesoro_core::onboarding::{
    AutomationBridge, AutomationKind, AutomationReply, AutomationStatus, OnboardingRequest,
};
use tesoro_shared::config::FiscalConfig;
use tesoro_shared::{AppError, AppResult};
use tracing::{debug, info, instrument};

use crate::http::{build_client, decimal_to_json, json, string_from_json, transport_error};

const SERVICE: &str = "fiscal bridge";
const WSID: &str = "wsfe";

/// Tickets closer than this many minutes to expiry are renewed.
const TICKET_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
struct Ticket {
    token: String,
    sign: String,
    expires_at: DateTime<Utc>,
}

/// Client of the fiscal bridge and its automation API.
#[derive(Debug)]
pub struct AfipSdkClient {
    http: Client,
    base_url: String,
    access_token: String,
    tickets: DashMap<(i64, &'static str), Ticket>,
}

impl AfipSdkClient {
    /// Creates a client from configuration.
    pub fn new(config: &FiscalConfig) -> AppResult<Self> {
        Ok(Self {
            http: build_client(Duration::from_secs(config.request_timeout_secs))?,
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            tickets: DashMap::new(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> AppResult<Value> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        json(SERVICE, response).await
    }

    async fn ticket(&self, credentials: &FiscalCredentials) -> AppResult<Ticket> {
        let key = (credentials.cuit, credentials.environment.as_str());
        if let Some(ticket) = self.tickets.get(&key)
            && ticket.expires_at - chrono::Duration::minutes(TICKET_MARGIN_MINUTES) > Utc::now()
        {
            return Ok(ticket.clone());
        }

        let mut body = json!({
            "environment": credentials.environment.as_str(),
            "tax_id": credentials.cuit.to_string(),
            "wsid": WSID,
        });
        if let Some(alias) = &credentials.cert_alias {
            body["cert_alias"] = json!(alias);
        }
        let reply = self.post("/afip/auth", &body).await?;
        let ticket = parse_ticket(&reply)?;
        debug!(cuit = credentials.cuit, expires_at = %ticket.expires_at, "access ticket renewed");
        self.tickets.insert(key, ticket.clone());
        Ok(ticket)
    }

    async fn call(
        &self,
        credentials: &FiscalCredentials,
        method: &str,
        mut params: Value,
    ) -> AppResult<Value> {
        let ticket = self.ticket(credentials).await?;
        params["Auth"] = json!({
            "Token": ticket.token,
            "Sign": ticket.sign,
            "Cuit": credentials.cuit,
        });
        let body = json!({
            "environment": credentials.environment.as_str(),
            "method": method,
            "wsid": WSID,
            "params": params,
        });
        self.post("/afip/requests", &body).await
    }
}

fn malformed(what: &str) -> AppError {
    AppError::ExternalService(format!("{SERVICE} sent a malformed {what}"))
}

fn parse_ticket(body: &Value) -> AppResult<Ticket> {
    let token = body["token"].as_str().ok_or_else(|| malformed("ticket"))?;
    let sign = body["sign"].as_str().ok_or_else(|| malformed("ticket"))?;
    let expires_at = body["expiration"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(|| Utc::now() + chrono::Duration::hours(12), |dt| dt.with_timezone(&Utc));
    Ok(Ticket {
        token: token.to_string(),
        sign: sign.to_string(),
        expires_at,
    })
}

/// The authority serializes one-element lists as a bare object.
fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn messages(value: &Value) -> Vec<AuthorityMessage> {
    one_or_many(value)
        .into_iter()
        .map(|m| AuthorityMessage {
            code: m["Code"].as_i64().unwrap_or_default(),
            message: m["Msg"].as_str().unwrap_or_default().to_string(),
        })
        .collect()
}

fn authority_date(value: &Value) -> Option<NaiveDate> {
    let text = string_from_json(value)?;
    NaiveDate::parse_from_str(&text, "%Y%m%d").ok()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub(crate) fn last_authorized_params(pto_vta: i32, cbte_tipo: VoucherType) -> Value {
    json!({ "PtoVta": pto_vta, "CbteTipo": cbte_tipo.code() })
}

pub(crate) fn parse_last_authorized(body: &Value) -> AppResult<i64> {
    let result = &body["FECompUltimoAutorizadoResult"];
    if let Some(number) = result["CbteNro"].as_i64() {
        return Ok(number);
    }
    let errors = messages(&result["Errors"]["Err"]);
    if errors.is_empty() {
        return Err(malformed("last voucher answer"));
    }
    let detail = errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::ExternalService(format!(
        "{SERVICE} could not read the last voucher: {detail}"
    )))
}

pub(crate) fn voucher_params(request: &VoucherRequest) -> Value {
    let mut detail = json!({
        "Concepto": request.concepto,
        "DocTipo": request.doc_tipo,
        "DocNro": request.doc_nro,
        "CbteDesde": request.cbte_nro,
        "CbteHasta": request.cbte_nro,
        "CbteFch": format_date(request.cbte_fch),
        "ImpTotal": decimal_to_json(request.imp_total),
        "ImpTotConc": decimal_to_json(request.imp_tot_conc),
        "ImpNeto": decimal_to_json(request.imp_neto),
        "ImpOpEx": decimal_to_json(request.imp_op_ex),
        "ImpIVA": decimal_to_json(request.imp_iva),
        "ImpTrib": decimal_to_json(request.imp_trib),
        "MonId": request.mon_id,
        "MonCotiz": decimal_to_json(request.mon_cotiz),
    });
    if let Some(date) = request.fch_serv_desde {
        detail["FchServDesde"] = json!(format_date(date));
    }
    if let Some(date) = request.fch_serv_hasta {
        detail["FchServHasta"] = json!(format_date(date));
    }
    if let Some(date) = request.fch_vto_pago {
        detail["FchVtoPago"] = json!(format_date(date));
    }
    if !request.iva.is_empty() {
        let lines: Vec<Value> = request
            .iva
            .iter()
            .map(|line| {
                json!({
                    "Id": line.id,
                    "BaseImp": decimal_to_json(line.base_imp),
                    "Importe": decimal_to_json(line.importe),
                })
            })
            .collect();
        detail["Iva"] = json!({ "AlicIva": lines });
    }

    json!({
        "FeCAEReq": {
            "FeCabReq": {
                "CantReg": 1,
                "PtoVta": request.pto_vta,
                "CbteTipo": request.cbte_tipo,
            },
            "FeDetReq": { "FECAEDetRequest": [detail] },
        }
    })
}

pub(crate) fn parse_authorization(body: &Value) -> AppResult<AuthorityResponse> {
    let result = &body["FECAESolicitarResult"];
    let detail = one_or_many(&result["FeDetResp"]["FECAEDetResponse"])
        .into_iter()
        .next();
    let errors = messages(&result["Errors"]["Err"]);

    let resultado = detail
        .and_then(|d| d["Resultado"].as_str())
        .or_else(|| result["FeCabResp"]["Resultado"].as_str());

    let resultado = match resultado {
        Some(r) => r.to_string(),
        // Request-level errors come without a detail block
        None if !errors.is_empty() => "R".to_string(),
        None => return Err(malformed("authorization answer")),
    };

    Ok(AuthorityResponse {
        resultado,
        cae: detail
            .and_then(|d| string_from_json(&d["CAE"]))
            .filter(|cae| !cae.trim().is_empty()),
        cae_fch_vto: detail.and_then(|d| authority_date(&d["CAEFchVto"])),
        observations: detail
            .map(|d| messages(&d["Observaciones"]["Obs"]))
            .unwrap_or_default(),
        errors,
    })
}

pub(crate) fn automation_params(kind: AutomationKind, request: &OnboardingRequest) -> Value {
    let mut params = json!({
        "cuit": request.cuit.to_string(),
        "username": request.username,
        "password": request.password,
        "alias": request.alias,
    });
    if kind == AutomationKind::AuthorizeWebService {
        params["service"] = json!(request.service);
    }
    params
}

pub(crate) fn parse_automation_reply(body: &Value) -> AutomationReply {
    let data = match &body["data"] {
        Value::Null => None,
        other => Some(other.clone()),
    };
    let message = body["data"]["message"]
        .as_str()
        .or_else(|| body["message"].as_str())
        .or_else(|| body["data"].as_str())
        .map(str::to_string);
    AutomationReply {
        status: AutomationStatus::parse(body["status"].as_str().unwrap_or_default()),
        job_id: string_from_json(&body["id"]),
        data,
        message,
    }
}

#[async_trait]
impl FiscalBridge for AfipSdkClient {
    #[instrument(skip(self, credentials), fields(cuit = credentials.cuit))]
    async fn last_authorized(
        &self,
        credentials: &FiscalCredentials,
        pto_vta: i32,
        cbte_tipo: VoucherType,
    ) -> AppResult<i64> {
        let body = self
            .call(
                credentials,
                "FECompUltimoAutorizado",
                last_authorized_params(pto_vta, cbte_tipo),
            )
            .await?;
        parse_last_authorized(&body)
    }

    #[instrument(
        skip(self, credentials, request),
        fields(cuit = credentials.cuit, cbte_nro = request.cbte_nro)
    )]
    async fn request_authorization(
        &self,
        credentials: &FiscalCredentials,
        request: &VoucherRequest,
    ) -> AppResult<AuthorityResponse> {
        let body = self
            .call(credentials, "FECAESolicitar", voucher_params(request))
            .await?;
        parse_authorization(&body)
    }
}

#[async_trait]
impl AutomationBridge for AfipSdkClient {
    #[instrument(skip(self, request), fields(cuit = request.cuit))]
    async fn submit(
        &self,
        kind: AutomationKind,
        request: &OnboardingRequest,
    ) -> AppResult<AutomationReply> {
        let body = json!({
            "automation": kind.automation_name(),
            "params": automation_params(kind, request),
            "wait": false,
        });
        let reply = parse_automation_reply(&self.post("/automations", &body).await?);
        info!(automation = kind.automation_name(), job_id = ?reply.job_id, "automation submitted");
        Ok(reply)
    }

    async fn poll(&self, job_id: &str) -> AppResult<AutomationReply> {
        let response = self
            .http
            .get(format!("{}/automations/{job_id}", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;
        let body: Value = json(SERVICE, response).await?;
        Ok(parse_automation_reply(&body))
    }
}
