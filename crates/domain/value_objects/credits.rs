use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{
        notifications::NotificationEntity, user_boosts::UserBoostEntity,
        user_credits::UserCreditEntity,
    },
    value_objects::enums::credit_kinds::CreditKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditGrant {
    #[serde(rename = "type")]
    pub kind: CreditKind,
    pub quantity: i32,
}

/// A one-time purchase that has been resolved to a concrete grant, keyed by the
/// provider reference that makes it idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseGrant {
    pub purchase_ref: String,
    pub user_id: Uuid,
    pub grant: CreditGrant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Applied(UserCreditEntity),
    AlreadyApplied,
}

impl GrantOutcome {
    pub fn is_already_applied(&self) -> bool {
        matches!(self, GrantOutcome::AlreadyApplied)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremiumActivation {
    pub credits: UserCreditEntity,
    pub premium_until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuperlikeReceipt {
    pub notification: NotificationEntity,
    pub remaining: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoostActivation {
    pub boost: UserBoostEntity,
    pub remaining: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UseCreditRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditBalances {
    pub superlike_credits: i32,
    pub boost_credits: i32,
    pub premium_tokens: i32,
}

impl From<&UserCreditEntity> for CreditBalances {
    fn from(entity: &UserCreditEntity) -> Self {
        Self {
            superlike_credits: entity.superlike_credits,
            boost_credits: entity.boost_credits,
            premium_tokens: entity.premium_tokens,
        }
    }
}
