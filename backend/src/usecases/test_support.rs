use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crates::{
    domain::{
        entities::{
            fulfilled_purchases::InsertFulfilledPurchaseEntity,
            notifications::NotificationEntity,
            plans::{PlanEntity, UpsertPlanEntity},
            subscriptions::{SubscriptionEntity, UpdateCachedPlanEntity, UpsertSubscriptionEntity},
            user_boosts::UserBoostEntity,
            user_credit_events::{
                REASON_BOOST_ACTIVATED, REASON_PURCHASE, REASON_SUBSCRIPTION_PERIOD,
                REASON_SUPERLIKE_SENT, REASON_TOKEN_USED, UserCreditEventEntity,
            },
            user_credits::UserCreditEntity,
        },
        repositories::{
            boosts::BoostRepository, plans::PlanRepository, relations::RelationRepository,
            subscriptions::SubscriptionRepository, user_credits::UserCreditRepository,
        },
        value_objects::{
            credits::{
                BoostActivation, GrantOutcome, PremiumActivation, PurchaseGrant,
                SuperlikeReceipt,
            },
            enums::credit_kinds::CreditKind,
        },
    },
    infra::db::repositories::user_credits::extend_premium,
};
use uuid::Uuid;

/// Mutex-backed stand-in for the Postgres repositories. Every trait method
/// holds the lock for its whole body, which gives the same all-or-nothing
/// behavior as a database transaction.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    credits: HashMap<Uuid, UserCreditEntity>,
    events: Vec<UserCreditEventEntity>,
    fulfilled: HashSet<String>,
    premium_until: HashMap<Uuid, Option<DateTime<Utc>>>,
    boosts: Vec<UserBoostEntity>,
    relations: HashSet<(Uuid, Uuid, String)>,
    notifications: Vec<NotificationEntity>,
    subscriptions: Vec<SubscriptionEntity>,
    plans: Vec<PlanEntity>,
}

impl State {
    fn credits_mut(&mut self, user_id: Uuid) -> &mut UserCreditEntity {
        self.credits
            .entry(user_id)
            .or_insert_with(|| UserCreditEntity::empty(user_id))
    }

    fn take_one(&mut self, user_id: Uuid, kind: CreditKind) -> Option<i32> {
        let balance = self.credits_mut(user_id).balance_mut(kind);
        if *balance <= 0 {
            return None;
        }
        *balance -= 1;
        Some(*balance)
    }

    fn record(
        &mut self,
        user_id: Uuid,
        kind: CreditKind,
        delta: i32,
        reason: &str,
        related_user_id: Option<Uuid>,
    ) {
        self.events.push(UserCreditEventEntity {
            id: Uuid::new_v4(),
            user_id,
            type_: kind.to_string(),
            delta,
            reason: Some(reason.to_string()),
            related_user_id,
            created_at: Utc::now(),
        });
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_credits(&self, user_id: Uuid, kind: CreditKind, quantity: i32) {
        let mut state = self.state.lock().unwrap();
        *state.credits_mut(user_id).balance_mut(kind) += quantity;
        state.record(user_id, kind, quantity, REASON_PURCHASE, None);
    }

    pub fn seed_user(&self, user_id: Uuid, premium_until: Option<DateTime<Utc>>) {
        self.state
            .lock()
            .unwrap()
            .premium_until
            .insert(user_id, premium_until);
    }

    pub fn seed_plan(&self, plan: PlanEntity) {
        self.state.lock().unwrap().plans.push(plan);
    }

    pub fn seed_subscription(&self, subscription: SubscriptionEntity) {
        self.state.lock().unwrap().subscriptions.push(subscription);
    }

    pub fn balance(&self, user_id: Uuid, kind: CreditKind) -> i32 {
        self.state
            .lock()
            .unwrap()
            .credits
            .get(&user_id)
            .map(|credits| credits.balance(kind))
            .unwrap_or(0)
    }

    pub fn ledger_sum(&self, user_id: Uuid, kind: CreditKind) -> i32 {
        let kind = kind.to_string();
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|event| event.user_id == user_id && event.type_ == kind)
            .map(|event| event.delta)
            .sum()
    }

    pub fn events_with_reason(&self, user_id: Uuid, reason: &str) -> Vec<UserCreditEventEntity> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|event| event.user_id == user_id && event.reason.as_deref() == Some(reason))
            .cloned()
            .collect()
    }

    pub fn premium_until(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .premium_until
            .get(&user_id)
            .copied()
            .flatten()
    }

    pub fn has_relation(&self, actor_id: Uuid, target_id: Uuid, kind: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .relations
            .contains(&(actor_id, target_id, kind.to_string()))
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<NotificationEntity> {
        self.state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionEntity> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn plans(&self) -> Vec<PlanEntity> {
        let mut plans = self.state.lock().unwrap().plans.clone();
        plans.sort_by(|a, b| a.price_id.cmp(&b.price_id));
        plans
    }
}

pub fn sample_subscription(user_id: Uuid, stripe_subscription_id: Option<&str>) -> SubscriptionEntity {
    SubscriptionEntity {
        id: Uuid::new_v4(),
        user_id,
        stripe_customer_id: Some("cus_1".to_string()),
        stripe_subscription_id: stripe_subscription_id.map(str::to_string),
        status: "active".to_string(),
        current_period_end: None,
        plan_price_id: None,
        plan_interval: None,
        plan_slug: Some("monthly".to_string()),
        last_granted_period_start: None,
        last_granted_period_end: None,
        created_at: Utc::now(),
    }
}

pub fn sample_plan(price_id: &str) -> PlanEntity {
    PlanEntity {
        id: Uuid::new_v4(),
        product_id: "prod_1".to_string(),
        price_id: price_id.to_string(),
        plan_slug: Some("monthly".to_string()),
        name: Some("Monthly".to_string()),
        description: None,
        plan_type: "subscription".to_string(),
        interval: Some("month".to_string()),
        unit_amount: 999,
        currency: "USD".to_string(),
        grants_chat: true,
        credit_type: None,
        credit_quantity: 0,
        superlikes_per_period: None,
        superlike_period: None,
        boosts_per_week: None,
        unlimited_swipes: false,
        see_who_liked: false,
        priority_support: false,
        badge: false,
        active: true,
        sort_order: 0,
    }
}

fn plan_from_upsert(id: Uuid, plan: UpsertPlanEntity) -> PlanEntity {
    PlanEntity {
        id,
        product_id: plan.product_id,
        price_id: plan.price_id,
        plan_slug: plan.plan_slug,
        name: plan.name,
        description: plan.description,
        plan_type: plan.plan_type,
        interval: plan.interval,
        unit_amount: plan.unit_amount,
        currency: plan.currency,
        grants_chat: plan.grants_chat,
        credit_type: plan.credit_type,
        credit_quantity: plan.credit_quantity,
        superlikes_per_period: plan.superlikes_per_period,
        superlike_period: plan.superlike_period,
        boosts_per_week: plan.boosts_per_week,
        unlimited_swipes: plan.unlimited_swipes,
        see_who_liked: plan.see_who_liked,
        priority_support: plan.priority_support,
        badge: plan.badge,
        active: plan.active,
        sort_order: plan.sort_order,
    }
}

#[async_trait]
impl UserCreditRepository for InMemoryStore {
    async fn get_or_create(&self, user_id: Uuid) -> Result<UserCreditEntity> {
        Ok(self.state.lock().unwrap().credits_mut(user_id).clone())
    }

    async fn list_events(&self, user_id: Uuid, limit: i64) -> Result<Vec<UserCreditEventEntity>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|event| event.user_id == user_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn grant_purchase(&self, purchase: PurchaseGrant) -> Result<GrantOutcome> {
        let mut state = self.state.lock().unwrap();
        if !state.fulfilled.insert(purchase.purchase_ref.clone()) {
            return Ok(GrantOutcome::AlreadyApplied);
        }
        let kind = purchase.grant.kind;
        let credits = state.credits_mut(purchase.user_id);
        *credits.balance_mut(kind) += purchase.grant.quantity;
        let credits = credits.clone();
        state.record(
            purchase.user_id,
            kind,
            purchase.grant.quantity,
            REASON_PURCHASE,
            None,
        );
        Ok(GrantOutcome::Applied(credits))
    }

    async fn activate_premium_token(
        &self,
        user_id: Uuid,
        premium_days: i64,
    ) -> Result<Option<PremiumActivation>> {
        let mut state = self.state.lock().unwrap();
        let Some(current) = state.premium_until.get(&user_id).copied() else {
            return Err(anyhow!("user {user_id} not found"));
        };
        if state.take_one(user_id, CreditKind::Premium).is_none() {
            return Ok(None);
        }
        let premium_until = extend_premium(current, Utc::now(), premium_days);
        state.premium_until.insert(user_id, Some(premium_until));
        state.record(user_id, CreditKind::Premium, -1, REASON_TOKEN_USED, None);
        Ok(Some(PremiumActivation {
            credits: state.credits_mut(user_id).clone(),
            premium_until,
        }))
    }

    async fn grant_subscription_period(
        &self,
        subscription_id: Uuid,
        user_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        quantity: i32,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(subscription) = state
            .subscriptions
            .iter_mut()
            .find(|subscription| subscription.id == subscription_id)
        else {
            return Ok(false);
        };
        if subscription
            .last_granted_period_end
            .is_some_and(|granted| granted >= period_end)
        {
            return Ok(false);
        }
        subscription.last_granted_period_start = Some(period_start);
        subscription.last_granted_period_end = Some(period_end);

        *state.credits_mut(user_id).balance_mut(CreditKind::Superlike) += quantity;
        state.record(
            user_id,
            CreditKind::Superlike,
            quantity,
            REASON_SUBSCRIPTION_PERIOD,
            None,
        );
        Ok(true)
    }
}

#[async_trait]
impl BoostRepository for InMemoryStore {
    async fn activate_boost(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<BoostActivation>> {
        let mut state = self.state.lock().unwrap();
        let Some(remaining) = state.take_one(user_id, CreditKind::Boost) else {
            return Ok(None);
        };
        let boost = UserBoostEntity {
            id: Uuid::new_v4(),
            user_id,
            activated_at: Utc::now(),
            expires_at,
        };
        state.boosts.push(boost.clone());
        state.record(user_id, CreditKind::Boost, -1, REASON_BOOST_ACTIVATED, None);
        Ok(Some(BoostActivation { boost, remaining }))
    }

    async fn list_active_boosts(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserBoostEntity>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .boosts
            .iter()
            .filter(|boost| boost.user_id == user_id && boost.expires_at > now)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RelationRepository for InMemoryStore {
    async fn send_superlike(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<SuperlikeReceipt>> {
        let mut state = self.state.lock().unwrap();
        let Some(remaining) = state.take_one(actor_id, CreditKind::Superlike) else {
            return Ok(None);
        };
        for kind in ["like", "superlike"] {
            state
                .relations
                .insert((actor_id, target_id, kind.to_string()));
        }
        let notification = NotificationEntity {
            id: Uuid::new_v4(),
            user_id: target_id,
            type_: "superlike".to_string(),
            actor_id: Some(actor_id),
            payload: serde_json::json!({ "super": true }),
            read_at: None,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        state.record(
            actor_id,
            CreditKind::Superlike,
            -1,
            REASON_SUPERLIKE_SENT,
            Some(target_id),
        );
        Ok(Some(SuperlikeReceipt {
            notification,
            remaining,
        }))
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn find_latest_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .filter(|subscription| subscription.user_id == user_id)
            .max_by_key(|subscription| subscription.created_at)
            .cloned())
    }

    async fn activate_from_checkout(
        &self,
        subscription: UpsertSubscriptionEntity,
        purchase: InsertFulfilledPurchaseEntity,
    ) -> Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        state.fulfilled.insert(purchase.purchase_ref);
        state.premium_until.entry(subscription.user_id).or_insert(None);

        let existing = state.subscriptions.iter_mut().find(|row| {
            row.stripe_subscription_id.as_deref() == Some(subscription.stripe_subscription_id.as_str())
        });
        if let Some(row) = existing {
            row.user_id = subscription.user_id;
            row.stripe_customer_id = subscription.stripe_customer_id;
            row.status = subscription.status;
            row.current_period_end = subscription.current_period_end;
            row.plan_price_id = subscription.plan_price_id;
            row.plan_interval = subscription.plan_interval;
            row.plan_slug = subscription.plan_slug;
            return Ok(row.id);
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now() + Duration::microseconds(state.subscriptions.len() as i64);
        state.subscriptions.push(SubscriptionEntity {
            id,
            user_id: subscription.user_id,
            stripe_customer_id: subscription.stripe_customer_id,
            stripe_subscription_id: Some(subscription.stripe_subscription_id),
            status: subscription.status,
            current_period_end: subscription.current_period_end,
            plan_price_id: subscription.plan_price_id,
            plan_interval: subscription.plan_interval,
            plan_slug: subscription.plan_slug,
            last_granted_period_start: None,
            last_granted_period_end: None,
            created_at,
        });
        Ok(id)
    }

    async fn update_cached_plan(
        &self,
        subscription_id: Uuid,
        snapshot: UpdateCachedPlanEntity,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .subscriptions
            .iter_mut()
            .find(|subscription| subscription.id == subscription_id)
            .ok_or_else(|| anyhow!("subscription {subscription_id} not found"))?;
        row.status = snapshot.status;
        row.plan_price_id = snapshot.plan_price_id;
        row.plan_interval = snapshot.plan_interval;
        row.plan_slug = snapshot.plan_slug;
        Ok(())
    }
}

#[async_trait]
impl PlanRepository for InMemoryStore {
    async fn find_active_by_price_id(&self, price_id: &str) -> Result<Option<PlanEntity>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .plans
            .iter()
            .find(|plan| plan.active && plan.price_id == price_id)
            .cloned())
    }

    async fn find_active_by_slug(&self, plan_slug: &str) -> Result<Option<PlanEntity>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .plans
            .iter()
            .find(|plan| plan.active && plan.plan_slug.as_deref() == Some(plan_slug))
            .cloned())
    }

    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>> {
        let state = self.state.lock().unwrap();
        let mut plans: Vec<PlanEntity> =
            state.plans.iter().filter(|plan| plan.active).cloned().collect();
        plans.sort_by_key(|plan| (plan.sort_order, plan.unit_amount));
        Ok(plans)
    }

    async fn sync_product_plans(
        &self,
        product_id: &str,
        plans: Vec<UpsertPlanEntity>,
        active_price_ids: Vec<String>,
    ) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let count = plans.len();
        for plan in plans {
            match state
                .plans
                .iter_mut()
                .find(|row| row.price_id == plan.price_id)
            {
                Some(row) => {
                    let id = row.id;
                    *row = plan_from_upsert(id, plan);
                }
                None => state.plans.push(plan_from_upsert(Uuid::new_v4(), plan)),
            }
        }
        if !active_price_ids.is_empty() {
            for row in state.plans.iter_mut() {
                if row.product_id == product_id && !active_price_ids.contains(&row.price_id) {
                    row.active = false;
                }
            }
        }
        Ok(count)
    }
}
