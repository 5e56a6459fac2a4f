use std::collections::HashMap;

use crate::domain::value_objects::enums::credit_kinds::CreditKind;

/// Static quantities granted by the legacy pack checkout, used only when neither
/// the local catalog nor provider price metadata resolves a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackQuantities {
    pub superlike: i32,
    pub boost: i32,
    pub premium: i32,
}

impl Default for PackQuantities {
    fn default() -> Self {
        Self {
            superlike: 5,
            boost: 3,
            premium: 1,
        }
    }
}

impl PackQuantities {
    pub fn quantity_for(&self, kind: CreditKind) -> i32 {
        match kind {
            CreditKind::Superlike => self.superlike,
            CreditKind::Boost => self.boost,
            CreditKind::Premium => self.premium,
        }
    }
}

/// Legacy `plan` name -> provider price id table (weekly/monthly/yearly and the
/// three credit packs) configured through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyPriceIds {
    prices: HashMap<String, String>,
}

impl LegacyPriceIds {
    pub fn new(prices: HashMap<String, String>) -> Self {
        let prices = prices
            .into_iter()
            .filter(|(_, price_id)| !price_id.trim().is_empty())
            .map(|(plan, price_id)| (plan.trim().to_ascii_lowercase(), price_id.trim().to_string()))
            .collect();
        Self { prices }
    }

    pub fn price_for(&self, plan: &str) -> Option<&str> {
        self.prices
            .get(&plan.trim().to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Maps a legacy pack plan name (`superlike`, `boost`, `premium`) to its credit kind.
pub fn legacy_pack_kind(plan: &str) -> Option<CreditKind> {
    CreditKind::from_str(plan)
}
