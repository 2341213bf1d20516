//! Closed enumerations shared by the tender and bid workflows.
//!
//! Every enum is stored as its wire name in a `VARCHAR` column, so
//! `as_str` and `FromStr` are the only conversions the persistence layer
//! needs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($wire => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(OrganizationType, "organization type", {
    IndividualEntrepreneur => "IE",
    LimitedLiabilityCompany => "LLC",
    JointStockCompany => "JSC",
});

wire_enum!(ServiceType, "service type", {
    Construction => "Construction",
    Delivery => "Delivery",
    Manufacture => "Manufacture",
});

wire_enum!(TenderStatus, "tender status", {
    Created => "Created",
    Published => "Published",
    Closed => "Closed",
});

wire_enum!(BidStatus, "bid status", {
    Created => "Created",
    Published => "Published",
    Canceled => "Canceled",
});

wire_enum!(AuthorType, "author type", {
    User => "User",
    Organization => "Organization",
});

wire_enum!(Decision, "decision", {
    Approved => "Approved",
    Rejected => "Rejected",
});

/// Outcome of checking a requested status change against a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The entity is already in the requested status.
    Unchanged,
    Allowed,
    Rejected,
}

impl TenderStatus {
    pub fn transition_to(self, next: TenderStatus) -> Transition {
        use TenderStatus::*;
        match (self, next) {
            (from, to) if from == to => Transition::Unchanged,
            (Created, Published) | (Created, Closed) | (Published, Closed) => Transition::Allowed,
            _ => Transition::Rejected,
        }
    }
}

impl BidStatus {
    pub fn transition_to(self, next: BidStatus) -> Transition {
        use BidStatus::*;
        match (self, next) {
            (from, to) if from == to => Transition::Unchanged,
            (Created, Published) | (Created, Canceled) | (Published, Canceled) => {
                Transition::Allowed
            }
            _ => Transition::Rejected,
        }
    }

    /// Statuses a caller may request through the generic status endpoint.
    /// `Published` is only reachable through an approval decision.
    pub fn settable_directly(self) -> bool {
        matches!(self, BidStatus::Canceled)
    }
}

impl Decision {
    pub fn target_status(self) -> BidStatus {
        match self {
            Decision::Approved => BidStatus::Published,
            Decision::Rejected => BidStatus::Canceled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for status in TenderStatus::ALL {
            assert_eq!(status.as_str().parse::<TenderStatus>().unwrap(), *status);
        }
        assert_eq!(
            "LLC".parse::<OrganizationType>().unwrap(),
            OrganizationType::LimitedLiabilityCompany
        );
    }

    #[test]
    fn parsing_is_case_sensitive() {
        let err = "published".parse::<TenderStatus>().unwrap_err();
        assert_eq!(err.kind, "tender status");
        assert_eq!(err.value, "published");
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ServiceType::Manufacture).unwrap();
        assert_eq!(json, "\"Manufacture\"");
        let parsed: AuthorType = serde_json::from_str("\"Organization\"").unwrap();
        assert_eq!(parsed, AuthorType::Organization);
    }

    #[test]
    fn tender_transitions_follow_lifecycle() {
        use TenderStatus::*;
        assert_eq!(Created.transition_to(Published), Transition::Allowed);
        assert_eq!(Published.transition_to(Closed), Transition::Allowed);
        assert_eq!(Created.transition_to(Closed), Transition::Allowed);
        assert_eq!(Published.transition_to(Published), Transition::Unchanged);
        assert_eq!(Closed.transition_to(Published), Transition::Rejected);
        assert_eq!(Published.transition_to(Created), Transition::Rejected);
    }

    #[test]
    fn bid_transitions_end_in_terminal_states() {
        use BidStatus::*;
        assert_eq!(Created.transition_to(Published), Transition::Allowed);
        assert_eq!(Created.transition_to(Canceled), Transition::Allowed);
        assert_eq!(Published.transition_to(Canceled), Transition::Allowed);
        assert_eq!(Canceled.transition_to(Published), Transition::Rejected);
        assert_eq!(Canceled.transition_to(Created), Transition::Rejected);
    }

    #[test]
    fn only_cancel_is_directly_settable() {
        assert!(BidStatus::Canceled.settable_directly());
        assert!(!BidStatus::Published.settable_directly());
        assert!(!BidStatus::Created.settable_directly());
    }

    #[test]
    fn decisions_map_to_statuses() {
        assert_eq!(Decision::Approved.target_status(), BidStatus::Published);
        assert_eq!(Decision::Rejected.target_status(), BidStatus::Canceled);
        assert!("Maybe".parse::<Decision>().is_err());
    }
}
