//! Authentication claims used to resolve the caller's agencies.
//!
//! Tokens are issued by the surrounding system; this crate only needs the
//! subject and the list of agencies the subject may act on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AgencyId, UserId};

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Agencies the user may act on.
    #[serde(default)]
    pub agency_ids: Vec<Uuid>,
    /// User's role.
    pub role: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        agency_ids: Vec<Uuid>,
        role: &str,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            agency_ids,
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        UserId::from_uuid(self.sub)
    }

    /// Returns true if the user may act on the given agency.
    #[must_use]
    pub fn can_access(&self, agency_id: AgencyId) -> bool {
        self.agency_ids.contains(&agency_id.into_inner())
    }

    /// Returns true for administrative roles allowed to override state.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self.role.as_str(), "admin" | "owner" | "super_admin")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_can_access_only_listed_agencies() {
        let agency = Uuid::new_v4();
        let claims = Claims::new(
            Uuid::new_v4(),
            vec![agency],
            "seller",
            Utc::now() + Duration::minutes(5),
        );

        assert!(claims.can_access(AgencyId::from_uuid(agency)));
        assert!(!claims.can_access(AgencyId::new()));
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_missing_agency_ids_deserializes_empty() {
        let json = format!(
            r#"{{"sub":"{}","role":"admin","iat":0,"exp":1}}"#,
            Uuid::new_v4()
        );
        let claims: Claims = serde_json::from_str(&json).unwrap();
        assert!(claims.agency_ids.is_empty());
        assert!(claims.is_admin());
    }
}
