pub mod fulfilled_purchases;
pub mod notifications;
pub mod plans;
pub mod subscriptions;
pub mod user_boosts;
pub mod user_credit_events;
pub mod user_credits;
pub mod user_relations;
