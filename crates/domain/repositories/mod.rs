pub mod boosts;
pub mod plans;
pub mod relations;
pub mod subscriptions;
pub mod user_credits;
