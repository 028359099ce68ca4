//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `LedgerId` where a `TransactionId` is expected.

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

typed_id!(LedgerId, "Unique identifier for a ledger.");
typed_id!(TransactionId, "Unique identifier for a transaction.");
typed_id!(AdjustmentId, "Unique identifier for an adjustment record.");
typed_id!(DepositId, "Unique identifier for a deposit record.");

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_typed_id_creation() {
        let id = LedgerId::new();
        assert!(!id.to_string().is_empty());
    }

    #[test]
    fn test_typed_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = TransactionId::from_uuid(uuid);
        assert_eq!(id.into_inner(), uuid);
    }

    #[test]
    fn test_typed_id_from_str_round_trip() {
        let id = LedgerId::new();
        let parsed = LedgerId::from_str(&id.to_string()).expect("Failed to parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_typed_id_rejects_garbage() {
        assert!(LedgerId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_typed_id_serde_is_transparent() {
        let id = DepositId::new();
        let json = serde_json::to_string(&id).expect("Failed to serialize");
        assert_eq!(json, format!("\"{}\"", id.into_inner()));
    }

    #[test]
    fn test_typed_ids_are_unique() {
        let first = AdjustmentId::new();
        let second = AdjustmentId::new();
        assert_ne!(first, second);
    }
}
