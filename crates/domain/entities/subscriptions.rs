use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::subscriptions;

/// Cached copy of a provider subscription. Status and dates here are never
/// authoritative; the reconciler overwrites them from live provider data.
#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub plan_price_id: Option<String>,
    pub plan_interval: Option<String>,
    pub plan_slug: Option<String>,
    pub last_granted_period_start: Option<DateTime<Utc>>,
    pub last_granted_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Upsert keyed by `stripe_subscription_id`, so repeated checkout
/// notifications for one subscription update the same row.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct UpsertSubscriptionEntity {
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub plan_price_id: Option<String>,
    pub plan_interval: Option<String>,
    pub plan_slug: Option<String>,
}

/// Snapshot persisted after every refresh. Dates are deliberately absent.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = subscriptions, treat_none_as_null = true)]
pub struct UpdateCachedPlanEntity {
    pub status: String,
    pub plan_price_id: Option<String>,
    pub plan_interval: Option<String>,
    pub plan_slug: Option<String>,
}
