//! Fixtures for the `#[ignore]`d tests that run against a migrated Postgres:
//! `DATABASE_URL=... cargo test -- --ignored`.

use std::sync::Arc;

use diesel::{RunQueryDsl, insert_into, prelude::*};
use uuid::Uuid;

use crate::{
    domain::{
        repositories::user_credits::UserCreditRepository,
        value_objects::{
            credits::{CreditGrant, GrantOutcome, PurchaseGrant},
            enums::credit_kinds::CreditKind,
        },
    },
    infra::db::{
        postgres::{
            postgres_connection::{PgPoolSquad, establish_connection},
            schema::{user_credit_events, user_credits, users},
        },
        repositories::user_credits::UserCreditPostgres,
    },
};

pub(crate) fn pool() -> Arc<PgPoolSquad> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    Arc::new(establish_connection(&database_url, 16).expect("database pool"))
}

pub(crate) fn insert_user(db_pool: &PgPoolSquad) -> Uuid {
    let user_id = Uuid::new_v4();
    let mut conn = db_pool.get().unwrap();
    insert_into(users::table)
        .values(users::id.eq(user_id))
        .execute(&mut conn)
        .unwrap();
    user_id
}

/// Gives `user_id` a starting balance through the purchase path, so the
/// grant has its own ledger row.
pub(crate) async fn fund(db_pool: &Arc<PgPoolSquad>, user_id: Uuid, kind: CreditKind, quantity: i32) {
    let outcome = UserCreditPostgres::new(Arc::clone(db_pool))
        .grant_purchase(PurchaseGrant {
            purchase_ref: format!("cs_seed_{}", Uuid::new_v4()),
            user_id,
            grant: CreditGrant { kind, quantity },
        })
        .await
        .unwrap();
    assert!(matches!(outcome, GrantOutcome::Applied(_)));
}

pub(crate) fn balance(db_pool: &PgPoolSquad, user_id: Uuid, kind: CreditKind) -> i32 {
    let mut conn = db_pool.get().unwrap();
    let column = user_credits::table.filter(user_credits::user_id.eq(user_id));
    match kind {
        CreditKind::Superlike => column.select(user_credits::superlike_credits).first::<i32>(&mut conn),
        CreditKind::Boost => column.select(user_credits::boost_credits).first::<i32>(&mut conn),
        CreditKind::Premium => column.select(user_credits::premium_tokens).first::<i32>(&mut conn),
    }
    .unwrap()
}

/// Deltas of `kind` for `user_id`, oldest first.
pub(crate) fn ledger_deltas(db_pool: &PgPoolSquad, user_id: Uuid, kind: CreditKind) -> Vec<(i32, Option<String>)> {
    let mut conn = db_pool.get().unwrap();
    user_credit_events::table
        .filter(user_credit_events::user_id.eq(user_id))
        .filter(user_credit_events::type_.eq(kind.to_string()))
        .order((user_credit_events::created_at.asc(), user_credit_events::id.asc()))
        .select((user_credit_events::delta, user_credit_events::reason))
        .load::<(i32, Option<String>)>(&mut conn)
        .unwrap()
}

pub(crate) fn ledger_sum(db_pool: &PgPoolSquad, user_id: Uuid, kind: CreditKind) -> i32 {
    ledger_deltas(db_pool, user_id, kind)
        .iter()
        .map(|(delta, _)| delta)
        .sum()
}
