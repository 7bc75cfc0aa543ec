//! `SeaORM` entity definitions.

pub mod agencies;
pub mod billing_events;
pub mod card_board_actions;
pub mod card_board_settings;
pub mod cash_boxes;
pub mod exchange_rates;
pub mod financial_accounts;
pub mod fiscal_settings;
pub mod invoices;
pub mod iva_purchases;
pub mod iva_sales;
pub mod leads;
pub mod ledger_movements;
pub mod operation_financials;
pub mod operator_payments;
pub mod subscriptions;
pub mod webhook_failures;
