//! Port to the tax authority's RPC bridge.

use async_trait::async_trait;
use tesoro_shared::AppResult;

use super::settings::FiscalCredentials;
use super::types::{AuthorityResponse, VoucherRequest, VoucherType};

/// Request/response calls to the tax authority.
///
/// Implementations return `AppError::ExternalService` for transport failures
/// and 5xx answers. A rejection is a normal [`AuthorityResponse`].
#[async_trait]
pub trait FiscalBridge: Send + Sync {
    /// Last authorized voucher number (`FECompUltimoAutorizado`), 0 if none.
    async fn last_authorized(
        &self,
        credentials: &FiscalCredentials,
        pto_vta: i32,
        cbte_tipo: VoucherType,
    ) -> AppResult<i64>;

    /// Requests a CAE for one voucher (`FECAESolicitar`).
    async fn request_authorization(
        &self,
        credentials: &FiscalCredentials,
        request: &VoucherRequest,
    ) -> AppResult<AuthorityResponse>;
}
