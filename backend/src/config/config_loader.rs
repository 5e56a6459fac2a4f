use std::{collections::HashMap, str::FromStr};

use anyhow::{Context, Result};
use crates::domain::value_objects::plans::{LegacyPriceIds, PackQuantities};

use super::config_model::{
    BackendServer, Database, DotEnvyConfig, Entitlements, Stripe, UserSecret,
};

const LEGACY_PRICE_VARS: [(&str, &str); 6] = [
    ("weekly", "STRIPE_PRICE_WEEKLY"),
    ("monthly", "STRIPE_PRICE_MONTHLY"),
    ("yearly", "STRIPE_PRICE_YEARLY"),
    ("superlike", "STRIPE_PRICE_SUPERLIKE_PACK"),
    ("boost", "STRIPE_PRICE_BOOST_PACK"),
    ("premium", "STRIPE_PRICE_PREMIUM_ONETIME"),
];

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    Ok(DotEnvyConfig {
        backend_server: load_backend_server()?,
        database: load_database()?,
        stripe: load_stripe()?,
        entitlements: load_entitlements()?,
    })
}

pub fn load_backend_server() -> Result<BackendServer> {
    Ok(BackendServer {
        port: required_parse("SERVER_PORT_BACKEND")?,
        body_limit: optional_parse("SERVER_BODY_LIMIT", 10)?,
        timeout: optional_parse("SERVER_TIMEOUT", 30)?,
    })
}

pub fn load_database() -> Result<Database> {
    dotenvy::dotenv().ok();

    Ok(Database {
        url: required("DATABASE_URL")?,
        max_connections: optional_parse("DATABASE_MAX_CONNECTIONS", 10)?,
    })
}

pub fn load_stripe() -> Result<Stripe> {
    dotenvy::dotenv().ok();

    let legacy_prices = LEGACY_PRICE_VARS
        .iter()
        .filter_map(|(plan, key)| optional(key).map(|price_id| (plan.to_string(), price_id)))
        .collect::<HashMap<_, _>>();

    Ok(Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        default_product_id: optional("STRIPE_DEFAULT_PRODUCT_ID"),
        frontend_url: optional("BASE_FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string()),
        timeout_secs: optional_parse("STRIPE_TIMEOUT_SECS", 15)?,
        legacy_prices: LegacyPriceIds::new(legacy_prices),
    })
}

pub fn load_entitlements() -> Result<Entitlements> {
    let defaults = Entitlements::default();

    Ok(Entitlements {
        pack_quantities: PackQuantities {
            superlike: optional_parse("SUPERLIKE_PACK_CREDITS", defaults.pack_quantities.superlike)?,
            boost: optional_parse("BOOST_PACK_CREDITS", defaults.pack_quantities.boost)?,
            premium: optional_parse("PREMIUM_ONETIME_TOKENS", defaults.pack_quantities.premium)?,
        },
        boost_minutes: optional_parse("BOOST_DURATION_MINUTES", defaults.boost_minutes)?,
        premium_token_days: optional_parse("PREMIUM_TOKEN_DAYS", defaults.premium_token_days)?,
    })
}

pub fn get_user_secret() -> Result<UserSecret> {
    dotenvy::dotenv().ok();

    Ok(UserSecret {
        secret: required("JWT_USER_SECRET")?,
    })
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is not set"))
}

fn required_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(key)?
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

fn optional_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn optional_parse_uses_default_when_unset_or_blank() {
        unsafe {
            env::remove_var("HEARTLINE_TEST_UNSET");
            env::set_var("HEARTLINE_TEST_BLANK", "  ");
        }

        assert_eq!(optional_parse::<i64>("HEARTLINE_TEST_UNSET", 30).unwrap(), 30);
        assert_eq!(optional_parse::<i64>("HEARTLINE_TEST_BLANK", 7).unwrap(), 7);
    }

    #[test]
    fn optional_parse_reports_invalid_values() {
        unsafe {
            env::set_var("HEARTLINE_TEST_INVALID", "thirty");
        }

        let err = optional_parse::<i64>("HEARTLINE_TEST_INVALID", 30).unwrap_err();
        assert!(err.to_string().contains("HEARTLINE_TEST_INVALID is invalid"));
    }

    #[test]
    fn required_reports_missing_key() {
        unsafe {
            env::remove_var("HEARTLINE_TEST_REQUIRED");
        }

        let err = required("HEARTLINE_TEST_REQUIRED").unwrap_err();
        assert_eq!(err.to_string(), "HEARTLINE_TEST_REQUIRED is not set");
    }
}
