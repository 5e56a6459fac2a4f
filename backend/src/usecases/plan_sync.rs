use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, bail};
use crates::{
    domain::{
        entities::plans::UpsertPlanEntity,
        repositories::plans::PlanRepository,
        value_objects::enums::{
            credit_kinds::CreditKind, plan_intervals::PlanInterval, plan_types::PlanType,
        },
    },
    payments::stripe_client::StripePrice,
};
use tracing::{error, info, warn};

use crate::usecases::stripe_gateway::StripeGateway;

const SUPERLIKE_PERIODS: [&str; 5] = ["day", "week", "month", "year", "none"];

/// Leading integer of a metadata value (`"10"`, `"10.5"` and `"10 credits"` all
/// read as 10). Values without leading digits count as absent.
pub fn metadata_int(metadata: &HashMap<String, String>, key: &str) -> Option<i32> {
    let raw = metadata.get(key)?.trim();
    let end = raw
        .char_indices()
        .find(|(idx, ch)| !(ch.is_ascii_digit() || (*idx == 0 && matches!(ch, '-' | '+'))))
        .map_or(raw.len(), |(idx, _)| idx);
    raw[..end].parse::<i32>().ok()
}

pub fn metadata_flag(metadata: &HashMap<String, String>, key: &str, default: bool) -> bool {
    metadata
        .get(key)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn metadata_str<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Maps one provider price to the local plan row.
pub fn plan_from_price(product_id: &str, price: &StripePrice) -> UpsertPlanEntity {
    let metadata = &price.metadata;
    let interval = price
        .recurring
        .as_ref()
        .and_then(|recurring| PlanInterval::from_str(&recurring.interval));
    let is_recurring = price.recurring.is_some();

    let plan_type = match metadata_str(metadata, "plan_type") {
        Some(raw) => PlanType::from_str(raw).unwrap_or_else(|| {
            warn!(price_id = %price.id, plan_type = raw, "plan_sync: unknown plan_type metadata");
            derived_plan_type(is_recurring)
        }),
        None => derived_plan_type(is_recurring),
    };

    let credit_kind = metadata_str(metadata, "credit_type").and_then(|raw| {
        let kind = CreditKind::from_str(raw);
        if kind.is_none() {
            warn!(price_id = %price.id, credit_type = raw, "plan_sync: unknown credit_type metadata");
        }
        kind
    });

    let plan_slug = metadata_str(metadata, "plan_slug")
        .map(str::to_string)
        .or_else(|| interval.and_then(|i| i.default_slug()).map(str::to_string))
        .or_else(|| {
            (!is_recurring)
                .then_some(credit_kind)
                .flatten()
                .map(|kind| format!("{kind}_pack"))
        })
        .unwrap_or_else(|| price.id.clone());

    let product = price.product_object();
    let name = price
        .nickname
        .clone()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| product.and_then(|product| product.name.clone()))
        .unwrap_or_else(|| plan_slug.clone());

    let superlike_period = metadata_str(metadata, "superlike_period")
        .map(|raw| raw.to_ascii_lowercase())
        .filter(|period| SUPERLIKE_PERIODS.contains(&period.as_str()));

    UpsertPlanEntity {
        product_id: product_id.to_string(),
        price_id: price.id.clone(),
        plan_slug: Some(plan_slug),
        name: Some(name),
        description: product.and_then(|product| product.description.clone()),
        plan_type: plan_type.to_string(),
        interval: interval.map(|interval| interval.to_string()),
        unit_amount: price
            .amount()
            .and_then(|amount| i32::try_from(amount).ok())
            .unwrap_or(0),
        currency: price
            .currency
            .as_deref()
            .unwrap_or("usd")
            .to_ascii_uppercase(),
        grants_chat: metadata_flag(metadata, "grants_chat", is_recurring),
        credit_type: credit_kind.map(|kind| kind.to_string()),
        credit_quantity: metadata_int(metadata, "credit_quantity").unwrap_or(0).max(0),
        superlikes_per_period: metadata_int(metadata, "superlikes_per_period"),
        superlike_period,
        boosts_per_week: metadata_int(metadata, "boosts_per_week"),
        unlimited_swipes: metadata_flag(metadata, "unlimited_swipes", false),
        see_who_liked: metadata_flag(metadata, "see_who_liked", false),
        priority_support: metadata_flag(metadata, "priority_support", false),
        badge: metadata_flag(metadata, "badge", false),
        active: price.active,
        sort_order: metadata_int(metadata, "sort_order").unwrap_or(0),
    }
}

fn derived_plan_type(is_recurring: bool) -> PlanType {
    if is_recurring {
        PlanType::Subscription
    } else {
        PlanType::OneTime
    }
}

pub struct PlanSyncUseCase<P, Stripe>
where
    P: PlanRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    stripe_client: Arc<Stripe>,
}

impl<P, Stripe> PlanSyncUseCase<P, Stripe>
where
    P: PlanRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>, stripe_client: Arc<Stripe>) -> Self {
        Self {
            plan_repo,
            stripe_client,
        }
    }

    /// Mirrors the product's active prices into `plans` and deactivates local
    /// rows whose price disappeared remotely. Returns the number of upserted plans.
    pub async fn sync_from_catalog(&self, product_id: &str) -> Result<usize> {
        let product_id = product_id.trim();
        if product_id.is_empty() {
            bail!("product id is required for plan sync");
        }

        info!(product_id, "plan_sync: listing provider prices");
        let prices = self
            .stripe_client
            .list_prices(product_id)
            .await
            .inspect_err(|err| {
                error!(product_id, error = ?err, "plan_sync: failed to list prices");
            })?;

        let plans: Vec<UpsertPlanEntity> = prices
            .iter()
            .filter(|price| price.active)
            .map(|price| plan_from_price(product_id, price))
            .collect();
        let active_price_ids: Vec<String> = plans.iter().map(|plan| plan.price_id.clone()).collect();

        let count = self
            .plan_repo
            .sync_product_plans(product_id, plans, active_price_ids)
            .await
            .inspect_err(|err| {
                error!(product_id, db_error = ?err, "plan_sync: failed to upsert plans");
            })?;

        info!(
            product_id,
            remote_prices = prices.len(),
            upserted = count,
            "plan_sync: catalog synced"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{stripe_gateway::MockStripeGateway, test_support::InMemoryStore};
    use mockall::predicate::eq;
    use serde_json::json;

    fn price(value: serde_json::Value) -> StripePrice {
        serde_json::from_value(value).unwrap()
    }

    fn catalog() -> Vec<StripePrice> {
        vec![
            price(json!({
                "id": "price_month",
                "unit_amount": 999,
                "currency": "usd",
                "recurring": { "interval": "month", "interval_count": 1 },
                "product": { "id": "prod_1", "name": "Heartline Gold", "description": "All features" },
                "metadata": { "superlikes_per_period": "5", "superlike_period": "month", "badge": "TRUE" }
            })),
            price(json!({
                "id": "price_superlikes",
                "unit_amount_decimal": "499.6",
                "currency": "eur",
                "metadata": { "credit_type": "superlike", "credit_quantity": "10", "sort_order": "3" }
            })),
            price(json!({
                "id": "price_retired",
                "active": false,
                "unit_amount": 100,
                "currency": "usd"
            })),
        ]
    }

    #[test]
    fn recurring_price_gets_interval_slug_and_entitlements() {
        let plan = plan_from_price("prod_1", &catalog()[0]);

        assert_eq!(plan.plan_type, "subscription");
        assert_eq!(plan.plan_slug.as_deref(), Some("monthly"));
        assert_eq!(plan.interval.as_deref(), Some("month"));
        assert_eq!(plan.name.as_deref(), Some("Heartline Gold"));
        assert_eq!(plan.description.as_deref(), Some("All features"));
        assert_eq!(plan.currency, "USD");
        assert!(plan.grants_chat);
        assert!(plan.badge);
        assert!(!plan.unlimited_swipes);
        assert_eq!(plan.superlikes_per_period, Some(5));
        assert_eq!(plan.superlike_period.as_deref(), Some("month"));
    }

    #[test]
    fn one_time_pack_uses_credit_slug_and_rounded_decimal_amount() {
        let plan = plan_from_price("prod_1", &catalog()[1]);

        assert_eq!(plan.plan_type, "one_time");
        assert_eq!(plan.plan_slug.as_deref(), Some("superlike_pack"));
        assert_eq!(plan.name.as_deref(), Some("superlike_pack"));
        assert_eq!(plan.unit_amount, 500);
        assert_eq!(plan.currency, "EUR");
        assert!(!plan.grants_chat);
        assert_eq!(plan.credit_type.as_deref(), Some("superlike"));
        assert_eq!(plan.credit_quantity, 10);
        assert_eq!(plan.sort_order, 3);
        assert_eq!(plan.interval, None);
    }

    #[test]
    fn invalid_metadata_falls_back_to_derived_values() {
        let plan = plan_from_price(
            "prod_1",
            &price(json!({
                "id": "price_odd",
                "metadata": {
                    "plan_type": "lifetime",
                    "credit_type": "gems",
                    "credit_quantity": "lots",
                    "superlike_period": "fortnight"
                }
            })),
        );

        assert_eq!(plan.plan_type, "one_time");
        assert_eq!(plan.plan_slug.as_deref(), Some("price_odd"));
        assert_eq!(plan.credit_type, None);
        assert_eq!(plan.credit_quantity, 0);
        assert_eq!(plan.superlike_period, None);
        assert_eq!(plan.unit_amount, 0);
        assert_eq!(plan.currency, "USD");
    }

    #[test]
    fn metadata_int_reads_the_leading_integer() {
        let metadata = HashMap::from([
            ("plain".to_string(), " 10 ".to_string()),
            ("decimal".to_string(), "10.5".to_string()),
            ("suffix".to_string(), "3 credits".to_string()),
            ("negative".to_string(), "-2".to_string()),
            ("words".to_string(), "lots".to_string()),
        ]);

        assert_eq!(metadata_int(&metadata, "plain"), Some(10));
        assert_eq!(metadata_int(&metadata, "decimal"), Some(10));
        assert_eq!(metadata_int(&metadata, "suffix"), Some(3));
        assert_eq!(metadata_int(&metadata, "negative"), Some(-2));
        assert_eq!(metadata_int(&metadata, "words"), None);
        assert_eq!(metadata_int(&metadata, "missing"), None);
    }

    #[tokio::test]
    async fn sync_upserts_active_prices_and_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let mut stale = crate::usecases::test_support::sample_plan("price_gone");
        stale.product_id = "prod_1".to_string();
        store.seed_plan(stale);

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_list_prices()
            .with(eq("prod_1"))
            .times(2)
            .returning(|_| Ok(catalog()));
        let usecase = PlanSyncUseCase::new(store.clone(), Arc::new(stripe));

        assert_eq!(usecase.sync_from_catalog("prod_1").await.unwrap(), 2);
        let first = store.plans();
        assert_eq!(usecase.sync_from_catalog("prod_1").await.unwrap(), 2);
        assert_eq!(store.plans(), first);

        let active: Vec<_> = first
            .iter()
            .filter(|plan| plan.active)
            .map(|plan| plan.price_id.as_str())
            .collect();
        assert_eq!(active, vec!["price_month", "price_superlikes"]);
        assert!(first.iter().any(|plan| plan.price_id == "price_gone" && !plan.active));
        assert!(!first.iter().any(|plan| plan.price_id == "price_retired"));
    }

    #[tokio::test]
    async fn empty_remote_catalog_deactivates_nothing() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_plan(crate::usecases::test_support::sample_plan("price_month"));

        let mut stripe = MockStripeGateway::new();
        stripe.expect_list_prices().returning(|_| Ok(Vec::new()));
        let usecase = PlanSyncUseCase::new(store.clone(), Arc::new(stripe));

        assert_eq!(usecase.sync_from_catalog("prod_1").await.unwrap(), 0);
        assert!(store.plans()[0].active);
    }
}
