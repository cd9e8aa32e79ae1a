use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::ServiceError;

/// Purchase lifecycle. `draft` is the only fully mutable state; `in_coop`
/// means batches have been materialized into a coop; `complete` and
/// `cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Draft,
    InCoop,
    Complete,
    Cancelled,
}

impl PurchaseStatus {
    /// Parses a stored or submitted status string.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        Self::from_str(raw).map_err(|_| {
            ServiceError::InvalidStatus(format!(
                "Unknown purchase status '{}'. Valid statuses: draft, in_coop, complete, cancelled",
                raw
            ))
        })
    }

    /// Whether the purchase header and items may still be edited.
    pub fn is_editable(self) -> bool {
        matches!(self, PurchaseStatus::Draft)
    }

    /// Whether deletion is blocked outright by the lifecycle.
    pub fn blocks_deletion(self) -> bool {
        matches!(self, PurchaseStatus::InCoop | PurchaseStatus::Complete)
    }

    /// Validates if a status transition is allowed
    pub fn can_transition_to(self, to: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        match (self, to) {
            (Draft, InCoop) => true,
            (Draft, Cancelled) => true,
            (InCoop, Complete) => true,
            (InCoop, Cancelled) => true,
            // Transitioning to the same status is a no-op
            _ if self == to => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PurchaseStatus::Draft, PurchaseStatus::InCoop, true)]
    #[case(PurchaseStatus::Draft, PurchaseStatus::Cancelled, true)]
    #[case(PurchaseStatus::Draft, PurchaseStatus::Complete, false)]
    #[case(PurchaseStatus::InCoop, PurchaseStatus::Complete, true)]
    #[case(PurchaseStatus::InCoop, PurchaseStatus::Cancelled, true)]
    #[case(PurchaseStatus::InCoop, PurchaseStatus::Draft, false)]
    #[case(PurchaseStatus::Complete, PurchaseStatus::Cancelled, false)]
    #[case(PurchaseStatus::Complete, PurchaseStatus::InCoop, false)]
    #[case(PurchaseStatus::Cancelled, PurchaseStatus::InCoop, false)]
    #[case(PurchaseStatus::Draft, PurchaseStatus::Draft, true)]
    fn transition_table(
        #[case] from: PurchaseStatus,
        #[case] to: PurchaseStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn parse_round_trips_through_display() {
        for status in [
            PurchaseStatus::Draft,
            PurchaseStatus::InCoop,
            PurchaseStatus::Complete,
            PurchaseStatus::Cancelled,
        ] {
            assert_eq!(PurchaseStatus::parse(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert!(matches!(
            PurchaseStatus::parse("shipped"),
            Err(ServiceError::InvalidStatus(_))
        ));
    }

    #[test]
    fn lifecycle_gates() {
        assert!(PurchaseStatus::Draft.is_editable());
        assert!(!PurchaseStatus::InCoop.is_editable());
        assert!(PurchaseStatus::InCoop.blocks_deletion());
        assert!(PurchaseStatus::Complete.blocks_deletion());
        assert!(!PurchaseStatus::Draft.blocks_deletion());
        assert!(!PurchaseStatus::Cancelled.blocks_deletion());
    }
}
