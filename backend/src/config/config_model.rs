use crates::domain::value_objects::plans::{LegacyPriceIds, PackQuantities};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub entitlements: Entitlements,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub default_product_id: Option<String>,
    pub frontend_url: String,
    pub timeout_secs: u64,
    pub legacy_prices: LegacyPriceIds,
}

#[derive(Debug, Clone)]
pub struct Entitlements {
    pub pack_quantities: PackQuantities,
    pub boost_minutes: i64,
    pub premium_token_days: i64,
}

impl Default for Entitlements {
    fn default() -> Self {
        Self {
            pack_quantities: PackQuantities::default(),
            boost_minutes: 30,
            premium_token_days: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSecret {
    pub secret: String,
}
