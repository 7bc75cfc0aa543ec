//! Subscriptions and provider status transitions.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use tesoro_shared::types::{AgencyId, SubscriptionId};

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// In the free trial.
    Trial,
    /// Paid and current.
    Active,
    /// Cancelled.
    Canceled,
    /// A charge failed.
    PastDue,
    /// Waiting for payment.
    Unpaid,
    /// Paused.
    Suspended,
}

impl SubscriptionStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "TRIAL",
            Self::Active => "ACTIVE",
            Self::Canceled => "CANCELED",
            Self::PastDue => "PAST_DUE",
            Self::Unpaid => "UNPAID",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRIAL" => Ok(Self::Trial),
            "ACTIVE" => Ok(Self::Active),
            "CANCELED" => Ok(Self::Canceled),
            "PAST_DUE" => Ok(Self::PastDue),
            "UNPAID" => Ok(Self::Unpaid),
            "SUSPENDED" => Ok(Self::Suspended),
            _ => Err(format!("Unknown subscription status: {s}")),
        }
    }
}

/// An agency's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Agency.
    pub agency_id: AgencyId,
    /// Plan.
    pub plan_id: String,
    /// Status.
    pub status: SubscriptionStatus,
    /// Provider preapproval id.
    pub mp_preapproval_id: Option<String>,
    /// Last raw provider status.
    pub mp_status: Option<String>,
    /// Current billing period start.
    pub current_period_start: Option<DateTime<Utc>>,
    /// Current billing period end.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Trial start.
    pub trial_start: Option<DateTime<Utc>>,
    /// Trial end.
    pub trial_end: Option<DateTime<Utc>>,
    /// Consecutive failed charges.
    pub payment_attempts: i32,
}

impl Subscription {
    /// Whether the trial window is still open at `now`.
    #[must_use]
    pub fn trial_open(&self, now: DateTime<Utc>) -> bool {
        self.trial_end.is_some_and(|end| end > now)
    }
}

/// Provider-side status of a preapproval or payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    /// `authorized` / `approved`.
    Approved,
    /// `paused`.
    Paused,
    /// `cancelled`.
    Cancelled,
    /// `pending` / `in_process`.
    Pending,
    /// `rejected`.
    Rejected,
    /// `failed`.
    Failed,
    /// Anything else.
    Other(String),
}

impl ProviderStatus {
    /// Parses a provider status string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "authorized" | "approved" => Self::Approved,
            "paused" => Self::Paused,
            "cancelled" | "canceled" => Self::Cancelled,
            "pending" | "in_process" => Self::Pending,
            "rejected" => Self::Rejected,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Applies a preapproval status. `None` when nothing changes.
///
/// approved → ACTIVE, or TRIAL while the trial is open; paused → SUSPENDED;
/// cancelled → CANCELED; pending → UNPAID unless TRIAL; rejected/failed →
/// PAST_DUE with one more failed attempt.
#[must_use]
pub fn apply_preapproval_status(
    subscription: &Subscription,
    raw_status: &str,
    now: DateTime<Utc>,
) -> Option<Subscription> {
    let mut next = subscription.clone();
    next.mp_status = Some(raw_status.to_string());
    match ProviderStatus::parse(raw_status) {
        ProviderStatus::Approved => {
            next.status = if subscription.trial_open(now) {
                SubscriptionStatus::Trial
            } else {
                SubscriptionStatus::Active
            };
        }
        ProviderStatus::Paused => next.status = SubscriptionStatus::Suspended,
        ProviderStatus::Cancelled => next.status = SubscriptionStatus::Canceled,
        ProviderStatus::Pending => {
            if subscription.status != SubscriptionStatus::Trial {
                next.status = SubscriptionStatus::Unpaid;
            }
        }
        ProviderStatus::Rejected | ProviderStatus::Failed => {
            next.status = SubscriptionStatus::PastDue;
            next.payment_attempts += 1;
        }
        ProviderStatus::Other(_) => return None,
    }
    (next != *subscription).then_some(next)
}

/// Applies a payment status. `None` when nothing changes.
///
/// An approved payment activates the subscription, rolls the period one
/// month forward and resets the attempt counter; a rejected or failed one
/// marks it PAST_DUE with one more attempt.
#[must_use]
pub fn apply_payment_status(
    subscription: &Subscription,
    raw_status: &str,
    now: DateTime<Utc>,
) -> Option<Subscription> {
    let mut next = subscription.clone();
    match ProviderStatus::parse(raw_status) {
        ProviderStatus::Approved => {
            let start = subscription
                .current_period_end
                .filter(|end| *end > now)
                .unwrap_or(now);
            next.status = SubscriptionStatus::Active;
            next.current_period_start = Some(start);
            next.current_period_end = start.checked_add_months(Months::new(1));
            next.payment_attempts = 0;
        }
        ProviderStatus::Rejected | ProviderStatus::Failed => {
            next.status = SubscriptionStatus::PastDue;
            next.payment_attempts += 1;
        }
        _ => return None,
    }
    Some(next)
}
