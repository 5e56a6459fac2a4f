//! Pulls the active prices of a Stripe product into the local plan catalog.
//!
//! Usage: `sync_plans [product_id]`. Without an argument the product id comes
//! from `STRIPE_DEFAULT_PRODUCT_ID`.

use anyhow::{Result, bail};
use backend::{config::config_loader, usecases::plan_sync::PlanSyncUseCase};
use crates::{
    infra::db::{postgres::postgres_connection, repositories::plans::PlanPostgres},
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Plan sync failed: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("sync_plans")?;

    let dotenvy_env = config_loader::load()?;

    let Some(product_id) = std::env::args()
        .nth(1)
        .or_else(|| dotenvy_env.stripe.default_product_id.clone())
    else {
        bail!("No Stripe product id given and STRIPE_DEFAULT_PRODUCT_ID is not set");
    };

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    let plan_repository = PlanPostgres::new(Arc::new(postgres_pool));
    let stripe_client = StripeClient::new(
        dotenvy_env.stripe.secret_key.clone(),
        dotenvy_env.stripe.webhook_secret.clone(),
        dotenvy_env.stripe.timeout_secs,
    )?;

    let usecase = PlanSyncUseCase::new(Arc::new(plan_repository), Arc::new(stripe_client));
    let synced = usecase.sync_from_catalog(&product_id).await?;

    info!(%product_id, synced, "Plan catalog synced");
    Ok(())
}
