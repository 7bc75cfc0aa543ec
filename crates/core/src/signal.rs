//! "Dashboard KPIs changed" notifications.
//!
//! Ledger-affecting mutations emit a signal per agency; the cache that
//! listens to it lives outside this crate.

use tesoro_shared::types::AgencyId;
use tokio::sync::broadcast;
use tracing::trace;

/// Receiver of KPI invalidation signals.
pub trait DashboardSignal: Send + Sync {
    /// Notifies that the agency's dashboard figures are stale.
    fn kpis_changed(&self, agency_id: AgencyId);
}

/// Discards every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSignal;

impl DashboardSignal for NoopSignal {
    fn kpis_changed(&self, _agency_id: AgencyId) {}
}

/// Fans signals out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSignal {
    sender: broadcast::Sender<AgencyId>,
}

impl BroadcastSignal {
    /// Creates a channel with room for `capacity` pending signals per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to future signals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgencyId> {
        self.sender.subscribe()
    }
}

impl DashboardSignal for BroadcastSignal {
    fn kpis_changed(&self, agency_id: AgencyId) {
        // No receivers is fine.
        if self.sender.send(agency_id).is_err() {
            trace!(%agency_id, "kpis_changed dropped, no subscribers");
        }
    }
}
