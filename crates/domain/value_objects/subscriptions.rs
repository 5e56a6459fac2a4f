use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    credits::CreditGrant,
    enums::{purchase_kinds::PurchaseKind, subscription_statuses::SubscriptionStatus},
};

/// Normalized subscription view returned to clients. `details` is absent when
/// the user has no provider subscription, which serializes as `{"status":"none"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionView {
    pub status: SubscriptionStatus,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub details: Option<SubscriptionDetails>,
}

impl SubscriptionView {
    pub fn none() -> Self {
        Self {
            status: SubscriptionStatus::None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionDetails {
    pub cancel_at_period_end: bool,
    pub paused: bool,
    pub plan_price_id: Option<String>,
    pub plan_interval: Option<String>,
    pub plan_interval_count: Option<i64>,
    pub plan_slug: Option<String>,
    pub plan_name: Option<String>,
    pub plan_amount: Option<i64>,
    pub plan_currency: Option<String>,
    pub superlikes_per_period: Option<i32>,
    pub superlike_period: Option<String>,
    pub boosts_per_week: Option<i32>,
    pub unlimited_swipes: bool,
    pub see_who_liked: bool,
    pub priority_support: bool,
    pub badge: bool,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub next_payment_attempt: Option<DateTime<Utc>>,
    pub will_renew: bool,
    pub renews_on: Option<DateTime<Utc>>,
    pub ends_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    /// `true` resumes auto-renew; anything else schedules cancellation at period end.
    pub enable: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCheckoutRequest {
    pub plan: Option<String>,
    pub price_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCheckoutResponse {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmCheckoutRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmCheckoutResponse {
    pub ok: bool,
    pub kind: PurchaseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant: Option<CreditGrant>,
    pub already_applied: bool,
}
