//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories implementing the store traits of `tesoro-core`
//! - A Postgres advisory lock for voucher-number allocation
//! - Database migrations

pub mod entities;
pub mod error;
pub mod lock;
pub mod migration;
pub mod repositories;

pub use lock::PgAdvisoryLock;
pub use repositories::{
    BillingRepository, CardBoardRepository, ExchangeRateRepository, FiscalSettingsRepository,
    InvoiceRepository, IvaRepository, LedgerRepository, OperationRepository,
    OperatorPaymentRepository, WebhookFailureRepository,
};

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection with explicit pool bounds.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with_pool(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
