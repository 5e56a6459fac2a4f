use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Subscription,
    OneTime,
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan_type = match self {
            PlanType::Subscription => "subscription",
            PlanType::OneTime => "one_time",
        };
        write!(f, "{}", plan_type)
    }
}

impl PlanType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "subscription" => Some(PlanType::Subscription),
            "one_time" => Some(PlanType::OneTime),
            _ => None,
        }
    }

    /// Checkout session mode expected by the payment provider.
    pub fn checkout_mode(&self) -> &'static str {
        match self {
            PlanType::Subscription => "subscription",
            PlanType::OneTime => "payment",
        }
    }
}
