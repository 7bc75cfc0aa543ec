//! Tesoro API Server
//!
//! Wires configuration, tracing, the database pool, the outbound clients and
//! the domain services into the HTTP router, and runs the periodic cash-box
//! reconciliation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sea_orm::DatabaseConnection;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tesoro_api::{AppState, create_router};
use tesoro_clients::{AfipSdkClient, MercadoPagoClient, TrelloClient};
use tesoro_core::billing::PaymentWebhookIngestor;
use tesoro_core::cardboard::CardBoardWebhookIngestor;
use tesoro_core::currency::ExchangeRateResolver;
use tesoro_core::fiscal::{InvoiceAuthorizer, LayeredAllocationLock};
use tesoro_core::iva::IvaService;
use tesoro_core::ledger::{BalanceProjector, LedgerService};
use tesoro_core::onboarding::{OnboardingPoller, OnboardingService, PollPolicy};
use tesoro_core::operation::OperationFinancialsService;
use tesoro_core::signal::{BroadcastSignal, DashboardSignal};
use tesoro_db::{
    BillingRepository, CardBoardRepository, ExchangeRateRepository, FiscalSettingsRepository,
    InvoiceRepository, IvaRepository, LedgerRepository, OperationRepository,
    OperatorPaymentRepository, PgAdvisoryLock, WebhookFailureRepository, connect_with_pool,
};
use tesoro_shared::config::LogFormat;
use tesoro_shared::{AppConfig, JwtConfig, JwtService};

/// Timeout of payment-provider and card-board calls.
const REST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pending KPI notifications kept per subscriber.
const SIGNAL_CAPACITY: usize = 256;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tesoro=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}

fn build_state(
    config: &AppConfig,
    db: &DatabaseConnection,
    signal: Arc<dyn DashboardSignal>,
) -> anyhow::Result<(AppState, Arc<BalanceProjector>)> {
    let production = config.environment.is_production();

    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: i64::try_from(config.jwt.access_token_expiry_secs / 60)
            .unwrap_or(i64::MAX),
    });

    // Outbound clients
    let afip = Arc::new(AfipSdkClient::new(&config.fiscal)?);
    let mercadopago = Arc::new(MercadoPagoClient::new(&config.billing, REST_TIMEOUT)?);
    let trello = Arc::new(TrelloClient::new(&config.card_board, REST_TIMEOUT)?);

    // Ledger
    let ledger_store = Arc::new(LedgerRepository::new(db.clone()));
    let rates = Arc::new(ExchangeRateResolver::new(
        Arc::new(ExchangeRateRepository::new(db.clone())),
        config.ledger.fallback_usd_ars_rate,
    ));
    let ledger = Arc::new(LedgerService::new(
        ledger_store.clone(),
        rates.clone(),
        signal.clone(),
        config.ledger.allow_degraded_rates,
    ));
    let balances = Arc::new(BalanceProjector::new(ledger_store));

    // IVA and operations
    let iva = Arc::new(IvaService::new(Arc::new(IvaRepository::new(db.clone()))));
    let operations = Arc::new(OperationFinancialsService::new(
        Arc::new(OperationRepository::new(db.clone())),
        iva.clone(),
        Arc::new(OperatorPaymentRepository::new(db.clone())),
        ledger.clone(),
        signal,
    ));

    // Fiscal
    let fiscal_settings = Arc::new(FiscalSettingsRepository::new(db.clone()));
    let invoices = Arc::new(InvoiceAuthorizer::new(
        Arc::new(InvoiceRepository::new(db.clone())),
        fiscal_settings.clone(),
        afip.clone(),
        Arc::new(LayeredAllocationLock::new(Arc::new(PgAdvisoryLock::new(
            db.clone(),
        )))),
        Duration::from_secs(config.fiscal.request_timeout_secs),
    ));
    let poller = Arc::new(OnboardingPoller::new(
        afip,
        PollPolicy {
            interval: Duration::from_secs(config.fiscal.poll_interval_secs),
            max_attempts: config.fiscal.max_poll_attempts,
        },
    ));
    let onboarding = Arc::new(OnboardingService::new(fiscal_settings, poller));

    // Webhooks
    let failures = Arc::new(WebhookFailureRepository::new(db.clone()));
    let payment_webhooks = Arc::new(PaymentWebhookIngestor::new(
        Arc::new(BillingRepository::new(db.clone())),
        mercadopago,
        failures.clone(),
        config.billing.webhook_secret.clone(),
        production,
    ));
    let card_webhooks = Arc::new(CardBoardWebhookIngestor::new(
        Arc::new(CardBoardRepository::new(db.clone())),
        trello,
        failures,
        config.card_board.webhook_secret.clone(),
        config.card_board.callback_url.clone(),
        production,
    ));

    if production && config.billing.webhook_secret.is_none() {
        warn!("billing webhook secret not configured, payment webhooks will be rejected");
    }
    if config.ledger.fallback_usd_ars_rate.is_some() {
        warn!(
            allow_degraded_rates = config.ledger.allow_degraded_rates,
            "fallback USD/ARS rate configured"
        );
    }

    let state = AppState {
        jwt_service: Arc::new(jwt_service),
        rates,
        ledger,
        balances: balances.clone(),
        iva,
        operations,
        invoices,
        onboarding,
        payment_webhooks,
        card_webhooks,
    };
    Ok((state, balances))
}

/// Rewrites drifted cash-box caches on a fixed interval.
fn spawn_reconciliation(balances: Arc<BalanceProjector>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match balances.reconcile_all_cash_boxes().await {
                Ok(reports) => {
                    let corrected = reports.iter().filter(|r| r.corrected).count();
                    info!(boxes = reports.len(), corrected, "cash boxes reconciled");
                }
                Err(e) => error!(error = %e, "cash box reconciliation run failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log.format);

    let db = connect_with_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    let signal = Arc::new(BroadcastSignal::new(SIGNAL_CAPACITY));
    let (state, balances) = build_state(&config, &db, signal)?;

    if config.ledger.reconcile_interval_secs > 0 {
        spawn_reconciliation(
            balances,
            Duration::from_secs(config.ledger.reconcile_interval_secs),
        );
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(environment = ?config.environment, "Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
