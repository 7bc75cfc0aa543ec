//! Helpers shared by the HTTP clients.

use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tesoro_shared::{AppError, AppResult};
use tracing::warn;

/// Longest response excerpt kept in error messages.
const BODY_EXCERPT: usize = 300;

/// Builds a client with a per-request timeout.
pub(crate) fn build_client(timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tesoro/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))
}

/// Transport failures, timeouts included, are retryable.
pub(crate) fn transport_error(service: &'static str, err: &reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::ExternalService(format!("{service} timed out"))
    } else {
        AppError::ExternalService(format!("{service} unreachable: {err}"))
    }
}

/// Decodes a JSON body; 404 becomes `None`, any other non-2xx an
/// `ExternalService` error.
pub(crate) async fn json_or_not_found<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> AppResult<Option<T>> {
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    json(service, response).await.map(Some)
}

/// Decodes a JSON body of a 2xx answer.
pub(crate) async fn json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> AppResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(service, &e))?;

    if !status.is_success() {
        warn!(service, status = status.as_u16(), "remote call failed");
        return Err(AppError::ExternalService(format!(
            "{service} answered {status}: {}",
            excerpt(&body)
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        AppError::ExternalService(format!("{service} sent an unexpected body: {e}"))
    })
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Reads a JSON number or numeric string as a decimal without going
/// through binary floating point.
pub(crate) fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Writes a decimal as a JSON number.
pub(crate) fn decimal_to_json(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))
}

/// Reads a JSON string or number as text.
pub(crate) fn string_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decimal_from_json() {
        assert_eq!(decimal_from_json(&json!(1234.5)), Some(dec!(1234.5)));
        assert_eq!(decimal_from_json(&json!(100)), Some(dec!(100)));
        assert_eq!(decimal_from_json(&json!("99.90")), Some(dec!(99.90)));
        assert_eq!(decimal_from_json(&json!(null)), None);
        assert_eq!(decimal_from_json(&json!("abc")), None);
    }

    #[test]
    fn test_decimal_to_json_is_number() {
        assert_eq!(decimal_to_json(dec!(1210.00)), json!(1210));
        assert!(decimal_to_json(dec!(210.50)).is_number());
    }

    #[test]
    fn test_string_from_json() {
        assert_eq!(string_from_json(&json!(123)), Some("123".into()));
        assert_eq!(string_from_json(&json!("abc")), Some("abc".into()));
        assert_eq!(string_from_json(&json!("")), None);
        assert_eq!(string_from_json(&json!(null)), None);
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(excerpt(&long).len(), BODY_EXCERPT);
        assert_eq!(excerpt("short"), "short");
    }
}
