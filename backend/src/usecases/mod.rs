pub mod boosts;
pub mod credits;
pub mod fulfillment;
pub mod plan_sync;
pub mod relations;
pub mod stripe_gateway;
pub mod subscription_view;
pub mod subscriptions;

#[cfg(test)]
pub(crate) mod test_support;
