use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{plans::PlanEntity, subscriptions::UpdateCachedPlanEntity},
        value_objects::{
            enums::{plan_intervals::PlanInterval, subscription_statuses::SubscriptionStatus},
            subscriptions::{SubscriptionDetails, SubscriptionView},
        },
    },
    payments::stripe_client::{StripeSubscription, timestamp_to_datetime},
};

/// Resolved billing period of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Period end fallback chain: `current_period_end` (subscription, then first
/// item), then `trial_end`, then `anchor + interval * interval_count` where the
/// anchor is `current_period_start` (subscription, then first item), then
/// `billing_cycle_anchor`, then `start_date`.
pub fn resolve_billing_period(subscription: &StripeSubscription) -> BillingPeriod {
    let anchor = subscription
        .period_start()
        .or(subscription.billing_cycle_anchor)
        .or(subscription.start_date)
        .and_then(timestamp_to_datetime);

    let end = subscription
        .period_end()
        .or(subscription.trial_end)
        .and_then(timestamp_to_datetime)
        .or_else(|| {
            let interval = plan_interval(subscription)?;
            let count = u32::try_from(interval_count(subscription)).ok()?;
            interval.advance(anchor?, count)
        });

    BillingPeriod { start: anchor, end }
}

fn plan_interval_raw(subscription: &StripeSubscription) -> Option<String> {
    subscription
        .first_price()
        .and_then(|price| price.recurring.as_ref())
        .map(|recurring| recurring.interval.clone())
        .or_else(|| subscription.plan.as_ref().and_then(|plan| plan.interval.clone()))
}

fn plan_interval(subscription: &StripeSubscription) -> Option<PlanInterval> {
    plan_interval_raw(subscription).as_deref().and_then(PlanInterval::from_str)
}

fn interval_count(subscription: &StripeSubscription) -> i64 {
    subscription
        .first_price()
        .and_then(|price| price.recurring.as_ref())
        .and_then(|recurring| recurring.interval_count)
        .or_else(|| subscription.plan.as_ref().and_then(|plan| plan.interval_count))
        .filter(|count| *count > 0)
        .unwrap_or(1)
}

/// Merges the live provider subscription with the local plan row. Catalog
/// values (name, amount, currency, entitlements) come from the plan when one
/// is known; provider values fill the gaps. Billing state is always the provider's.
pub fn to_subscription_view(
    subscription: &StripeSubscription,
    plan: Option<&PlanEntity>,
    cached_slug: Option<&str>,
) -> SubscriptionView {
    let status = SubscriptionStatus::from_str(&subscription.status);
    let price = subscription.first_price();
    let legacy_plan = subscription.plan.as_ref();
    let period = resolve_billing_period(subscription);

    let cancel_at_period_end = subscription.cancel_at_period_end;
    let will_renew = status == SubscriptionStatus::Active && !cancel_at_period_end;

    let plan_name = plan
        .and_then(|plan| plan.name.clone())
        .or_else(|| price.and_then(|price| price.nickname.clone()))
        .or_else(|| price.and_then(|price| price.product_object()?.name.clone()))
        .or_else(|| plan.and_then(|plan| plan.plan_slug.clone()));

    let plan_amount = plan.map(|plan| i64::from(plan.unit_amount)).or_else(|| {
        price
            .and_then(|price| price.amount())
            .or_else(|| legacy_plan.and_then(|plan| plan.amount))
    });

    let plan_currency = plan.map(|plan| plan.currency.clone()).or_else(|| {
        price
            .and_then(|price| price.currency.clone())
            .or_else(|| legacy_plan.and_then(|plan| plan.currency.clone()))
            .map(|currency| currency.to_ascii_uppercase())
    });

    let details = SubscriptionDetails {
        cancel_at_period_end,
        paused: subscription.is_paused(),
        plan_price_id: price
            .map(|price| price.id.clone())
            .or_else(|| legacy_plan.and_then(|plan| plan.id.clone())),
        plan_interval: plan_interval_raw(subscription),
        plan_interval_count: Some(interval_count(subscription)),
        plan_slug: plan
            .and_then(|plan| plan.plan_slug.clone())
            .or_else(|| cached_slug.map(str::to_string)),
        plan_name,
        plan_amount,
        plan_currency,
        superlikes_per_period: plan.and_then(|plan| plan.superlikes_per_period),
        superlike_period: plan.and_then(|plan| plan.superlike_period.clone()),
        boosts_per_week: plan.and_then(|plan| plan.boosts_per_week),
        unlimited_swipes: plan.is_some_and(|plan| plan.unlimited_swipes),
        see_who_liked: plan.is_some_and(|plan| plan.see_who_liked),
        priority_support: plan.is_some_and(|plan| plan.priority_support),
        badge: plan.is_some_and(|plan| plan.badge),
        current_period_start: period.start,
        current_period_end: period.end,
        trial_end: subscription.trial_end.and_then(timestamp_to_datetime),
        next_payment_attempt: subscription
            .next_payment_attempt()
            .and_then(timestamp_to_datetime),
        will_renew,
        renews_on: if will_renew { period.end } else { None },
        ends_on: if cancel_at_period_end { period.end } else { None },
    };

    SubscriptionView {
        status,
        details: Some(details),
    }
}

/// Cache row update derived from a fresh view. The status is stored as the
/// provider reported it, including states the view does not model. Dates are
/// never persisted here.
pub fn cached_plan_snapshot(view: &SubscriptionView, provider_status: &str) -> UpdateCachedPlanEntity {
    let details = view.details.as_ref();

    UpdateCachedPlanEntity {
        status: provider_status.to_string(),
        plan_price_id: details.and_then(|d| d.plan_price_id.clone()),
        plan_interval: details
            .and_then(|d| d.plan_interval.clone())
            .filter(|interval| PlanInterval::from_str(interval).is_some()),
        plan_slug: details.and_then(|d| d.plan_slug.clone()),
    }
}
