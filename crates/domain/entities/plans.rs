use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        credit_kinds::CreditKind, plan_intervals::PlanInterval, plan_types::PlanType,
    },
    infra::db::postgres::schema::plans,
};

/// Local mirror of one provider price, carrying the entitlement metadata the
/// fulfillment and reconciliation paths read.
#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub product_id: String,
    pub price_id: String,
    pub plan_slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub plan_type: String,
    pub interval: Option<String>,
    pub unit_amount: i32,
    pub currency: String,
    pub grants_chat: bool,
    pub credit_type: Option<String>,
    pub credit_quantity: i32,
    pub superlikes_per_period: Option<i32>,
    pub superlike_period: Option<String>,
    pub boosts_per_week: Option<i32>,
    pub unlimited_swipes: bool,
    pub see_who_liked: bool,
    pub priority_support: bool,
    pub badge: bool,
    pub active: bool,
    pub sort_order: i32,
}

impl PlanEntity {
    pub fn plan_type(&self) -> Option<PlanType> {
        PlanType::from_str(&self.plan_type)
    }

    pub fn interval(&self) -> Option<PlanInterval> {
        self.interval.as_deref().and_then(PlanInterval::from_str)
    }

    pub fn credit_kind(&self) -> Option<CreditKind> {
        self.credit_type.as_deref().and_then(CreditKind::from_str)
    }
}

/// Full row written by catalog sync. `None` fields overwrite to NULL so a
/// metadata key removed at the provider is removed locally too.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = plans, treat_none_as_null = true)]
pub struct UpsertPlanEntity {
    pub product_id: String,
    pub price_id: String,
    pub plan_slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub plan_type: String,
    pub interval: Option<String>,
    pub unit_amount: i32,
    pub currency: String,
    pub grants_chat: bool,
    pub credit_type: Option<String>,
    pub credit_quantity: i32,
    pub superlikes_per_period: Option<i32>,
    pub superlike_period: Option<String>,
    pub boosts_per_week: Option<i32>,
    pub unlimited_swipes: bool,
    pub see_who_liked: bool,
    pub priority_support: bool,
    pub badge: bool,
    pub active: bool,
    pub sort_order: i32,
}
