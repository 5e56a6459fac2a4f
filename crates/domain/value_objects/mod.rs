pub mod credits;
pub mod enums;
pub mod plans;
pub mod subscriptions;
