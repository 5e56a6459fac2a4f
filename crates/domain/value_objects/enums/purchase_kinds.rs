use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PurchaseKind {
    #[serde(rename = "subscription")]
    Subscription,
    #[serde(rename = "one-time")]
    OneTime,
}

impl Display for PurchaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            PurchaseKind::Subscription => "subscription",
            PurchaseKind::OneTime => "one_time",
        };
        write!(f, "{}", kind)
    }
}
