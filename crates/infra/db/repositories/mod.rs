pub mod boosts;
pub mod ledger;
pub mod plans;
pub mod relations;
pub mod subscriptions;
pub mod user_credits;

#[cfg(test)]
pub(crate) mod test_db;
