//! Mapping of database errors onto the application error taxonomy.

use std::str::FromStr;

use sea_orm::{DbErr, SqlErr};
use tesoro_shared::AppError;
use thiserror::Error;

/// A stored row that does not decode into a domain value.
#[derive(Debug, Error)]
pub enum RowError {
    /// A column holds a value the domain does not know.
    #[error("Invalid {table}.{column}: {message}")]
    InvalidValue {
        /// Table name.
        table: &'static str,
        /// Column name.
        column: &'static str,
        /// Parser message.
        message: String,
    },

    /// A JSON column does not match its shape.
    #[error("Invalid JSON in {table}.{column}: {source}")]
    Json {
        /// Table name.
        table: &'static str,
        /// Column name.
        column: &'static str,
        /// Decoder error.
        source: serde_json::Error,
    },
}

impl From<RowError> for AppError {
    fn from(err: RowError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Maps a `DbErr`: unique violations become `Conflict`, everything else
/// `Database`.
#[must_use]
pub fn db_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
        _ => AppError::Database(err.to_string()),
    }
}

/// Parses a text column with the domain type's `FromStr`.
pub(crate) fn parse_column<T>(
    table: &'static str,
    column: &'static str,
    value: &str,
) -> Result<T, RowError>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|message| RowError::InvalidValue {
        table,
        column,
        message,
    })
}

/// Decodes a JSON column.
pub(crate) fn from_json<T>(
    table: &'static str,
    column: &'static str,
    value: serde_json::Value,
) -> Result<T, RowError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(value).map_err(|source| RowError::Json {
        table,
        column,
        source,
    })
}

/// Encodes a JSON column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tesoro_shared::types::Currency;

    #[test]
    fn test_record_not_found_is_database_error() {
        let err = db_err(DbErr::RecordNotFound("invoices".into()));
        assert_eq!(err.status_code(), 500);
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_parse_column() {
        let currency: Currency = parse_column("cash_boxes", "currency", "USD").unwrap();
        assert_eq!(currency, Currency::Usd);

        let err = parse_column::<Currency>("cash_boxes", "currency", "EUR").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid cash_boxes.currency: Unknown currency: EUR"
        );
        assert!(matches!(AppError::from(err), AppError::Internal(_)));
    }

    #[test]
    fn test_json_round_trip_error() {
        let err = from_json::<Vec<String>>("invoices", "iva_lines", serde_json::json!({"a": 1}))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON in invoices.iva_lines"));
    }
}
