use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The three scarce per-user balances. Each maps to one column of `user_credits`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Superlike,
    Boost,
    Premium,
}

impl Display for CreditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            CreditKind::Superlike => "superlike",
            CreditKind::Boost => "boost",
            CreditKind::Premium => "premium",
        };
        write!(f, "{}", kind)
    }
}

impl CreditKind {
    pub const ALL: [CreditKind; 3] = [CreditKind::Superlike, CreditKind::Boost, CreditKind::Premium];

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "superlike" => Some(CreditKind::Superlike),
            "boost" => Some(CreditKind::Boost),
            "premium" => Some(CreditKind::Premium),
            _ => None,
        }
    }

    pub fn balance_column(&self) -> &'static str {
        match self {
            CreditKind::Superlike => "superlike_credits",
            CreditKind::Boost => "boost_credits",
            CreditKind::Premium => "premium_tokens",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds_case_insensitively() {
        assert_eq!(CreditKind::from_str("Superlike"), Some(CreditKind::Superlike));
        assert_eq!(CreditKind::from_str(" boost "), Some(CreditKind::Boost));
        assert_eq!(CreditKind::from_str("premium"), Some(CreditKind::Premium));
        assert_eq!(CreditKind::from_str("swipe"), None);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for kind in CreditKind::ALL {
            assert_eq!(CreditKind::from_str(&kind.to_string()), Some(kind));
        }
    }
}
