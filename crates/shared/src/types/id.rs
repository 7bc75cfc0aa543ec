//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `CashBoxId` where a `FinancialAccountId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user.");
typed_id!(AgencyId, "Unique identifier for an agency (tenant).");
typed_id!(OperationId, "Unique identifier for a sale/operation.");
typed_id!(LeadId, "Unique identifier for a CRM lead.");
typed_id!(OperatorId, "Unique identifier for an operator (supplier).");
typed_id!(SellerId, "Unique identifier for a seller.");
typed_id!(CustomerId, "Unique identifier for a customer.");
typed_id!(MovementId, "Unique identifier for a ledger movement.");
typed_id!(CashBoxId, "Unique identifier for a cash box.");
typed_id!(FinancialAccountId, "Unique identifier for a financial account.");
typed_id!(InvoiceId, "Unique identifier for a fiscal invoice.");
typed_id!(SubscriptionId, "Unique identifier for a subscription.");
typed_id!(OperatorPaymentId, "Unique identifier for an operator payable.");
typed_id!(BillingEventId, "Unique identifier for a billing event.");

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_ids_are_distinct() {
        assert_ne!(MovementId::new(), MovementId::new());
    }

    #[test]
    fn test_id_round_trips_through_string() {
        let id = InvoiceId::new();
        let parsed = InvoiceId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(AgencyId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&CashBoxId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
