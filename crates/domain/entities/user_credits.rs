use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::credit_kinds::CreditKind,
    infra::db::postgres::schema::user_credits,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_credits, primary_key(user_id))]
pub struct UserCreditEntity {
    pub user_id: Uuid,
    pub superlike_credits: i32,
    pub boost_credits: i32,
    pub premium_tokens: i32,
    pub updated_at: DateTime<Utc>,
}

impl UserCreditEntity {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            superlike_credits: 0,
            boost_credits: 0,
            premium_tokens: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn balance(&self, kind: CreditKind) -> i32 {
        match kind {
            CreditKind::Superlike => self.superlike_credits,
            CreditKind::Boost => self.boost_credits,
            CreditKind::Premium => self.premium_tokens,
        }
    }

    pub fn balance_mut(&mut self, kind: CreditKind) -> &mut i32 {
        match kind {
            CreditKind::Superlike => &mut self.superlike_credits,
            CreditKind::Boost => &mut self.boost_credits,
            CreditKind::Premium => &mut self.premium_tokens,
        }
    }
}
