use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::fulfilled_purchases;

/// Marker row keyed by the provider checkout session id. Its unique
/// `purchase_ref` is what makes confirm + webhook (and webhook redelivery)
/// converge on a single grant.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fulfilled_purchases)]
pub struct InsertFulfilledPurchaseEntity {
    pub purchase_ref: String,
    pub user_id: Uuid,
    pub purchase_kind: String,
    pub credit_type: Option<String>,
    pub quantity: i32,
}
