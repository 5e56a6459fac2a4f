//! Balance primitives shared by every repository that moves credits. Each one
//! runs on a connection that is already inside a transaction, so the balance
//! change and its ledger row commit or roll back together.

use anyhow::Result;
use chrono::Utc;
use diesel::{PgConnection, RunQueryDsl, insert_into, prelude::*, update};
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            user_credit_events::InsertUserCreditEventEntity, user_credits::UserCreditEntity,
        },
        value_objects::enums::credit_kinds::CreditKind,
    },
    infra::db::postgres::schema::{user_credit_events, user_credits},
};

/// Inserts the all-zero balance row if the user has none yet.
pub fn ensure_credit_row(conn: &mut PgConnection, user_id: Uuid) -> Result<()> {
    insert_into(user_credits::table)
        .values(user_credits::user_id.eq(user_id))
        .on_conflict_do_nothing()
        .execute(conn)?;

    Ok(())
}

/// `UPDATE ... SET col = col - 1 WHERE user_id = $1 AND col > 0 RETURNING col`.
/// `None` means the balance was already zero (or the row does not exist).
pub fn take_one_credit(conn: &mut PgConnection, user_id: Uuid, kind: CreditKind) -> Result<Option<i32>> {
    let now = Utc::now();
    let owner = user_credits::table.filter(user_credits::user_id.eq(user_id));

    let remaining = match kind {
        CreditKind::Superlike => update(owner.filter(user_credits::superlike_credits.gt(0)))
            .set((
                user_credits::superlike_credits.eq(user_credits::superlike_credits - 1),
                user_credits::updated_at.eq(now),
            ))
            .returning(user_credits::superlike_credits)
            .get_result::<i32>(conn)
            .optional()?,
        CreditKind::Boost => update(owner.filter(user_credits::boost_credits.gt(0)))
            .set((
                user_credits::boost_credits.eq(user_credits::boost_credits - 1),
                user_credits::updated_at.eq(now),
            ))
            .returning(user_credits::boost_credits)
            .get_result::<i32>(conn)
            .optional()?,
        CreditKind::Premium => update(owner.filter(user_credits::premium_tokens.gt(0)))
            .set((
                user_credits::premium_tokens.eq(user_credits::premium_tokens - 1),
                user_credits::updated_at.eq(now),
            ))
            .returning(user_credits::premium_tokens)
            .get_result::<i32>(conn)
            .optional()?,
    };

    Ok(remaining)
}

/// Adds `quantity` to the balance of `kind`, creating the row first if needed.
pub fn add_credits(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: CreditKind,
    quantity: i32,
) -> Result<UserCreditEntity> {
    ensure_credit_row(conn, user_id)?;

    let now = Utc::now();
    let owner = user_credits::table.filter(user_credits::user_id.eq(user_id));

    let credits = match kind {
        CreditKind::Superlike => update(owner)
            .set((
                user_credits::superlike_credits.eq(user_credits::superlike_credits + quantity),
                user_credits::updated_at.eq(now),
            ))
            .returning(UserCreditEntity::as_returning())
            .get_result::<UserCreditEntity>(conn)?,
        CreditKind::Boost => update(owner)
            .set((
                user_credits::boost_credits.eq(user_credits::boost_credits + quantity),
                user_credits::updated_at.eq(now),
            ))
            .returning(UserCreditEntity::as_returning())
            .get_result::<UserCreditEntity>(conn)?,
        CreditKind::Premium => update(owner)
            .set((
                user_credits::premium_tokens.eq(user_credits::premium_tokens + quantity),
                user_credits::updated_at.eq(now),
            ))
            .returning(UserCreditEntity::as_returning())
            .get_result::<UserCreditEntity>(conn)?,
    };

    Ok(credits)
}

pub fn record_event(conn: &mut PgConnection, event: &InsertUserCreditEventEntity) -> Result<()> {
    insert_into(user_credit_events::table)
        .values(event)
        .execute(conn)?;

    Ok(())
}
