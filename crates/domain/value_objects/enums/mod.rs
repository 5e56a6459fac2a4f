pub mod credit_kinds;
pub mod plan_intervals;
pub mod plan_types;
pub mod purchase_kinds;
pub mod subscription_statuses;
