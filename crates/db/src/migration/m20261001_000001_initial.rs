//! Initial database migration.
//!
//! Creates the ledger, IVA, invoicing, billing and card-board tables together
//! with their triggers and indexes.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: TENANTS
        // ============================================================
        db.execute_unprepared(AGENCIES_SQL).await?;

        // ============================================================
        // PART 2: EXCHANGE RATES
        // ============================================================
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;

        // ============================================================
        // PART 3: LEDGER
        // ============================================================
        db.execute_unprepared(FINANCIAL_ACCOUNTS_SQL).await?;
        db.execute_unprepared(CASH_BOXES_SQL).await?;
        db.execute_unprepared(LEDGER_MOVEMENTS_SQL).await?;

        // ============================================================
        // PART 4: OPERATIONS & IVA
        // ============================================================
        db.execute_unprepared(OPERATION_FINANCIALS_SQL).await?;
        db.execute_unprepared(OPERATOR_PAYMENTS_SQL).await?;
        db.execute_unprepared(IVA_SQL).await?;

        // ============================================================
        // PART 5: FISCAL INVOICING
        // ============================================================
        db.execute_unprepared(FISCAL_SETTINGS_SQL).await?;
        db.execute_unprepared(INVOICES_SQL).await?;

        // ============================================================
        // PART 6: BILLING
        // ============================================================
        db.execute_unprepared(SUBSCRIPTIONS_SQL).await?;
        db.execute_unprepared(BILLING_EVENTS_SQL).await?;
        db.execute_unprepared(WEBHOOK_FAILURES_SQL).await?;

        // ============================================================
        // PART 7: CARD BOARD & LEADS
        // ============================================================
        db.execute_unprepared(LEADS_SQL).await?;
        db.execute_unprepared(CARD_BOARD_SQL).await?;

        // ============================================================
        // PART 8: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const AGENCIES_SQL: &str = r"
CREATE TABLE agencies (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const EXCHANGE_RATES_SQL: &str = r"
-- One USD->ARS rate per effective date, shared by every agency
CREATE TABLE exchange_rates (
    effective_date DATE PRIMARY KEY,
    rate NUMERIC(19, 6) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_rate_positive CHECK (rate > 0)
);
";

const FINANCIAL_ACCOUNTS_SQL: &str = r"
CREATE TABLE financial_accounts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    account_type VARCHAR(50) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    initial_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_currency CHECK (currency IN ('ARS', 'USD'))
);

CREATE INDEX idx_financial_accounts_agency ON financial_accounts(agency_id);
";

const CASH_BOXES_SQL: &str = r"
CREATE TABLE cash_boxes (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    initial_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    -- Cache over ledger_movements, rewritten by the reconciliation job
    current_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    is_default BOOLEAN NOT NULL DEFAULT false,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_cash_box_currency CHECK (currency IN ('ARS', 'USD'))
);

CREATE INDEX idx_cash_boxes_agency ON cash_boxes(agency_id);
CREATE UNIQUE INDEX idx_cash_boxes_default ON cash_boxes(agency_id, currency) WHERE is_default;
";

const LEDGER_MOVEMENTS_SQL: &str = r"
CREATE TABLE ledger_movements (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    operation_id UUID,
    lead_id UUID,
    movement_type VARCHAR(30) NOT NULL,
    concept TEXT NOT NULL,
    currency VARCHAR(3) NOT NULL,
    amount_original NUMERIC(19, 4) NOT NULL,
    exchange_rate NUMERIC(19, 6),
    amount_ars_equivalent NUMERIC(19, 2) NOT NULL,
    method VARCHAR(20) NOT NULL,
    account_id UUID NOT NULL REFERENCES financial_accounts(id),
    cash_box_id UUID REFERENCES cash_boxes(id),
    operator_id UUID,
    seller_id UUID,
    movement_date DATE NOT NULL,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_movement_type CHECK (movement_type IN (
        'INCOME', 'EXPENSE', 'FX_GAIN', 'FX_LOSS', 'COMMISSION',
        'OPERATOR_PAYMENT', 'PARTNER_WITHDRAWAL'
    )),
    CONSTRAINT chk_movement_method CHECK (method IN ('CASH', 'BANK', 'CARD', 'MERCADOPAGO', 'OTHER')),
    CONSTRAINT chk_movement_currency CHECK (currency IN ('ARS', 'USD')),
    CONSTRAINT chk_amount_positive CHECK (amount_original > 0),
    CONSTRAINT chk_equivalent_non_negative CHECK (amount_ars_equivalent >= 0),
    -- A rate is stored iff the movement is not in the base currency
    CONSTRAINT chk_rate_iff_foreign CHECK ((currency = 'ARS') = (exchange_rate IS NULL))
);

CREATE INDEX idx_movements_operation ON ledger_movements(agency_id, operation_id) WHERE operation_id IS NOT NULL;
CREATE INDEX idx_movements_account ON ledger_movements(account_id, created_at);
CREATE INDEX idx_movements_cash_box ON ledger_movements(cash_box_id, created_at) WHERE cash_box_id IS NOT NULL;
";

const OPERATION_FINANCIALS_SQL: &str = r"
-- Last saved money-relevant snapshot of each operation
CREATE TABLE operation_financials (
    operation_id UUID PRIMARY KEY,
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    sale_amount NUMERIC(19, 4) NOT NULL,
    sale_currency VARCHAR(3) NOT NULL,
    operator_cost NUMERIC(19, 4) NOT NULL,
    operator_cost_currency VARCHAR(3) NOT NULL,
    operator_id UUID,
    exchange_rate NUMERIC(19, 6),
    payment_due_date DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_operation_financials_agency ON operation_financials(agency_id);
";

const OPERATOR_PAYMENTS_SQL: &str = r"
CREATE TABLE operator_payments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    operation_id UUID NOT NULL,
    operator_id UUID NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    due_date DATE,
    status VARCHAR(10) NOT NULL DEFAULT 'PENDING',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_operator_payment_status CHECK (status IN ('PENDING', 'PAID')),
    CONSTRAINT uq_operator_payment UNIQUE (operation_id, operator_id)
);

CREATE INDEX idx_operator_payments_agency ON operator_payments(agency_id, status);
";

const IVA_SQL: &str = r"
CREATE TABLE iva_sales (
    operation_id UUID PRIMARY KEY,
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    sale_amount_total NUMERIC(19, 4) NOT NULL,
    operator_cost_total NUMERIC(19, 4) NOT NULL,
    net_amount NUMERIC(19, 2) NOT NULL,
    iva_amount NUMERIC(19, 2) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_iva_sale_non_negative CHECK (iva_amount >= 0)
);

CREATE TABLE iva_purchases (
    operation_id UUID PRIMARY KEY,
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    operator_cost_total NUMERIC(19, 4) NOT NULL,
    net_amount NUMERIC(19, 2) NOT NULL,
    iva_amount NUMERIC(19, 2) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_iva_sales_agency ON iva_sales(agency_id);
CREATE INDEX idx_iva_purchases_agency ON iva_purchases(agency_id);
";

const FISCAL_SETTINGS_SQL: &str = r"
CREATE TABLE fiscal_settings (
    agency_id UUID PRIMARY KEY REFERENCES agencies(id) ON DELETE CASCADE,
    cuit BIGINT NOT NULL,
    pto_vta INTEGER NOT NULL,
    environment VARCHAR(4) NOT NULL DEFAULT 'dev',
    cert_alias VARCHAR(100),
    onboarding_status VARCHAR(20) NOT NULL DEFAULT 'pending',
    onboarding_error TEXT,
    onboarding_started_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_fiscal_environment CHECK (environment IN ('dev', 'prod')),
    CONSTRAINT chk_onboarding_status CHECK (onboarding_status IN (
        'pending', 'in_process', 'complete', 'error', 'timeout'
    ))
);
";

const INVOICES_SQL: &str = r"
CREATE TABLE invoices (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    operation_id UUID,
    customer_id UUID,
    cbte_tipo INTEGER NOT NULL,
    pto_vta INTEGER NOT NULL,
    cbte_nro BIGINT,
    cae VARCHAR(20),
    cae_fch_vto DATE,
    concepto INTEGER NOT NULL,
    doc_tipo INTEGER NOT NULL,
    doc_nro BIGINT NOT NULL,
    imp_neto NUMERIC(19, 2) NOT NULL DEFAULT 0,
    imp_iva NUMERIC(19, 2) NOT NULL DEFAULT 0,
    imp_op_ex NUMERIC(19, 2) NOT NULL DEFAULT 0,
    imp_tot_conc NUMERIC(19, 2) NOT NULL DEFAULT 0,
    imp_trib NUMERIC(19, 2) NOT NULL DEFAULT 0,
    imp_total NUMERIC(19, 2) NOT NULL,
    iva_lines JSONB NOT NULL DEFAULT '[]',
    moneda VARCHAR(3) NOT NULL DEFAULT 'ARS',
    moneda_cotizacion NUMERIC(19, 6),
    fch_serv_desde DATE,
    fch_serv_hasta DATE,
    fch_vto_pago DATE,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    fecha_emision DATE,
    observations JSONB NOT NULL DEFAULT '[]',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_invoice_status CHECK (status IN (
        'draft', 'pending', 'sent', 'authorized', 'rejected', 'cancelled'
    )),
    CONSTRAINT chk_cae_only_when_authorized CHECK (cae IS NULL OR status = 'authorized')
);

CREATE INDEX idx_invoices_agency ON invoices(agency_id, status);

-- A voucher number is authorized at most once per numbering sequence
CREATE UNIQUE INDEX idx_invoices_authorized_number
    ON invoices(agency_id, pto_vta, cbte_tipo, cbte_nro)
    WHERE status = 'authorized';
";

const SUBSCRIPTIONS_SQL: &str = r"
CREATE TABLE subscriptions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID NOT NULL UNIQUE REFERENCES agencies(id) ON DELETE CASCADE,
    plan_id VARCHAR(50) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'TRIAL',
    mp_preapproval_id VARCHAR(100) UNIQUE,
    mp_status VARCHAR(50),
    current_period_start TIMESTAMPTZ,
    current_period_end TIMESTAMPTZ,
    trial_start TIMESTAMPTZ,
    trial_end TIMESTAMPTZ,
    payment_attempts INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_subscription_status CHECK (status IN (
        'TRIAL', 'ACTIVE', 'CANCELED', 'PAST_DUE', 'UNPAID', 'SUSPENDED'
    ))
);
";

const BILLING_EVENTS_SQL: &str = r"
-- Webhook idempotency ledger: insert-only, one row per dedup key
CREATE TABLE billing_events (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID REFERENCES agencies(id) ON DELETE SET NULL,
    subscription_id UUID REFERENCES subscriptions(id) ON DELETE SET NULL,
    event_type VARCHAR(100) NOT NULL,
    mp_payment_id VARCHAR(100),
    mp_notification_id VARCHAR(100),
    mp_preapproval_id VARCHAR(100),
    dedup_id VARCHAR(100) GENERATED ALWAYS AS (
        COALESCE(mp_payment_id, mp_notification_id, mp_preapproval_id)
    ) STORED,
    amount NUMERIC(19, 4),
    payload JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_billing_event_dedup UNIQUE (event_type, dedup_id)
);

CREATE INDEX idx_billing_events_subscription ON billing_events(subscription_id, created_at DESC);
";

const WEBHOOK_FAILURES_SQL: &str = r"
CREATE TABLE webhook_failures (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    source VARCHAR(20) NOT NULL,
    event_type VARCHAR(100),
    external_id VARCHAR(100),
    error TEXT NOT NULL,
    payload TEXT NOT NULL,
    occurred_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_webhook_source CHECK (source IN ('billing', 'card_board'))
);

CREATE INDEX idx_webhook_failures_recent ON webhook_failures(source, occurred_at DESC);
";

const LEADS_SQL: &str = r"
CREATE TABLE leads (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    name VARCHAR(500) NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status VARCHAR(50),
    external_card_id VARCHAR(100),
    external_board_id VARCHAR(100),
    external_list_id VARCHAR(100),
    external_url TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX idx_leads_card ON leads(agency_id, external_card_id) WHERE external_card_id IS NOT NULL;
";

const CARD_BOARD_SQL: &str = r"
CREATE TABLE card_board_settings (
    board_id VARCHAR(100) PRIMARY KEY,
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    -- list id -> lead status
    list_status JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE card_board_actions (
    action_id VARCHAR(100) PRIMARY KEY,
    agency_id UUID NOT NULL REFERENCES agencies(id) ON DELETE CASCADE,
    action_type VARCHAR(100) NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: update_updated_at
-- ============================================================
CREATE OR REPLACE FUNCTION update_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_agencies_updated_at BEFORE UPDATE ON agencies
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_exchange_rates_updated_at BEFORE UPDATE ON exchange_rates
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_financial_accounts_updated_at BEFORE UPDATE ON financial_accounts
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_cash_boxes_updated_at BEFORE UPDATE ON cash_boxes
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_operation_financials_updated_at BEFORE UPDATE ON operation_financials
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_operator_payments_updated_at BEFORE UPDATE ON operator_payments
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_iva_sales_updated_at BEFORE UPDATE ON iva_sales
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_iva_purchases_updated_at BEFORE UPDATE ON iva_purchases
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_fiscal_settings_updated_at BEFORE UPDATE ON fiscal_settings
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_invoices_updated_at BEFORE UPDATE ON invoices
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_subscriptions_updated_at BEFORE UPDATE ON subscriptions
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_leads_updated_at BEFORE UPDATE ON leads
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();
CREATE TRIGGER trg_card_board_settings_updated_at BEFORE UPDATE ON card_board_settings
    FOR EACH ROW EXECUTE FUNCTION update_updated_at();

-- ============================================================
-- FUNCTION: reject_update
-- Ledger movements and billing events are insert-only
-- ============================================================
CREATE OR REPLACE FUNCTION reject_update()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION '% rows are immutable', TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_movements_immutable BEFORE UPDATE ON ledger_movements
    FOR EACH ROW EXECUTE FUNCTION reject_update();
CREATE TRIGGER trg_billing_events_immutable BEFORE UPDATE ON billing_events
    FOR EACH ROW EXECUTE FUNCTION reject_update();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- ============================================================
DROP TABLE IF EXISTS card_board_actions CASCADE;
DROP TABLE IF EXISTS card_board_settings CASCADE;
DROP TABLE IF EXISTS leads CASCADE;
DROP TABLE IF EXISTS webhook_failures CASCADE;
DROP TABLE IF EXISTS billing_events CASCADE;
DROP TABLE IF EXISTS subscriptions CASCADE;
DROP TABLE IF EXISTS invoices CASCADE;
DROP TABLE IF EXISTS fiscal_settings CASCADE;
DROP TABLE IF EXISTS iva_purchases CASCADE;
DROP TABLE IF EXISTS iva_sales CASCADE;
DROP TABLE IF EXISTS operator_payments CASCADE;
DROP TABLE IF EXISTS operation_financials CASCADE;
DROP TABLE IF EXISTS ledger_movements CASCADE;
DROP TABLE IF EXISTS cash_boxes CASCADE;
DROP TABLE IF EXISTS financial_accounts CASCADE;
DROP TABLE IF EXISTS exchange_rates CASCADE;
DROP TABLE IF EXISTS agencies CASCADE;

DROP FUNCTION IF EXISTS reject_update() CASCADE;
DROP FUNCTION IF EXISTS update_updated_at() CASCADE;
";
