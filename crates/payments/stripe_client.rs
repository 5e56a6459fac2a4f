use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Signed webhook timestamps older (or newer) than this are rejected.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub const EVENT_CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Stripe returns either an id or, when requested through `expand[]`, the object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Object(object) => Some(object),
            Expandable::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub mode: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<Expandable<StripeSubscription>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn is_subscription(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }

    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    pub fn subscription_id(&self) -> Option<&str> {
        match self.subscription.as_ref()? {
            Expandable::Id(id) => Some(id),
            Expandable::Object(subscription) => Some(&subscription.id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub customer: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub pause_collection: Option<serde_json::Value>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    pub start_date: Option<i64>,
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
    /// Pre-2018 subscriptions still carry the single `plan` object.
    pub plan: Option<StripeLegacyPlan>,
    pub latest_invoice: Option<Expandable<StripeInvoice>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeLegacyPlan {
    pub id: Option<String>,
    pub interval: Option<String>,
    pub interval_count: Option<i64>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: Option<String>,
    pub next_payment_attempt: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    #[serde(default = "default_true")]
    pub active: bool,
    pub nickname: Option<String>,
    pub unit_amount: Option<i64>,
    pub unit_amount_decimal: Option<String>,
    pub currency: Option<String>,
    pub recurring: Option<StripeRecurring>,
    pub product: Option<Expandable<StripeProduct>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripePrice {
    pub fn product_object(&self) -> Option<&StripeProduct> {
        self.product.as_ref().and_then(Expandable::as_object)
    }

    /// `unit_amount`, else the rounded decimal amount.
    pub fn amount(&self) -> Option<i64> {
        self.unit_amount.or_else(|| {
            self.unit_amount_decimal
                .as_deref()
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .map(|value| value.round() as i64)
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRecurring {
    pub interval: String,
    pub interval_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeLineItem {
    pub id: Option<String>,
    pub price: Option<StripePrice>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutParams {
    pub price_id: String,
    pub mode: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

impl StripeSubscription {
    pub fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.data.first()
    }

    pub fn first_price(&self) -> Option<&StripePrice> {
        self.first_item().and_then(|item| item.price.as_ref())
    }

    /// Period start from the subscription, falling back to the first item.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| self.first_item().and_then(|item| item.current_period_start))
    }

    /// Period end from the subscription, falling back to the first item.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.first_item().and_then(|item| item.current_period_end))
    }

    pub fn next_payment_attempt(&self) -> Option<i64> {
        self.latest_invoice
            .as_ref()
            .and_then(Expandable::as_object)
            .and_then(|invoice| invoice.next_payment_attempt)
    }

    pub fn is_paused(&self) -> bool {
        self.pause_collection
            .as_ref()
            .is_some_and(|value| !value.is_null())
    }
}

pub fn timestamp_to_datetime(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build stripe http client")?;

        Ok(Self {
            http,
            secret_key,
            webhook_secret,
        })
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (stripe_error_type, stripe_error_code, stripe_error_param, stripe_error_message, stripe_decline_code) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let details = envelope.error;
                    (
                        details.type_,
                        details.code,
                        details.param,
                        details.message,
                        details.decline_code,
                    )
                }
                Err(_) => (None, None, None, None, None),
            };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_param = ?stripe_error_param,
            stripe_error_message = ?stripe_error_message,
            stripe_decline_code = ?stripe_decline_code,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .get(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(query)
            .send()
            .await
            .with_context(|| format!("stripe request failed: {context}"))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .with_context(|| format!("invalid stripe response: {context}"))
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await
            .with_context(|| format!("stripe request failed: {context}"))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .with_context(|| format!("invalid stripe response: {context}"))
    }

    /// https://stripe.com/docs/api/subscriptions/retrieve
    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        self.get(
            &format!("/subscriptions/{subscription_id}"),
            &[
                ("expand[]", "items.data.price.product".to_string()),
                ("expand[]", "latest_invoice".to_string()),
            ],
            "retrieve subscription",
        )
        .await
    }

    /// Sets or clears cancel-at-period-end without proration.
    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<StripeSubscription> {
        let body = vec![
            (
                "cancel_at_period_end".to_string(),
                cancel_at_period_end.to_string(),
            ),
            ("proration_behavior".to_string(), "none".to_string()),
        ];

        self.post_form(
            &format!("/subscriptions/{subscription_id}"),
            &body,
            "update subscription cancel_at_period_end",
        )
        .await
    }

    /// https://stripe.com/docs/api/checkout/sessions/retrieve
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        self.get(
            &format!("/checkout/sessions/{session_id}"),
            &[("expand[]", "subscription".to_string())],
            "retrieve checkout session",
        )
        .await
    }

    pub async fn list_checkout_line_items(&self, session_id: &str) -> Result<Vec<StripeLineItem>> {
        let list: StripeList<StripeLineItem> = self
            .get(
                &format!("/checkout/sessions/{session_id}/line_items"),
                &[
                    ("limit", "10".to_string()),
                    ("expand[]", "data.price".to_string()),
                ],
                "list checkout line items",
            )
            .await?;

        Ok(list.data)
    }

    pub async fn retrieve_price(&self, price_id: &str) -> Result<StripePrice> {
        self.get(
            &format!("/prices/{price_id}"),
            &[("expand[]", "product".to_string())],
            "retrieve price",
        )
        .await
    }

    /// All prices of `product_id` (active and archived), following pagination.
    pub async fn list_prices(&self, product_id: &str) -> Result<Vec<StripePrice>> {
        let mut prices = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![
                ("product", product_id.to_string()),
                ("limit", "100".to_string()),
                ("expand[]", "data.product".to_string()),
            ];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let page: StripeList<StripePrice> = self.get("/prices", &query, "list prices").await?;
            let has_more = page.has_more;
            starting_after = page.data.last().map(|price| price.id.clone());
            prices.extend(page.data);

            if !has_more || starting_after.is_none() {
                break;
            }
        }

        Ok(prices)
    }

    /// Creates a Checkout Session and returns its URL.
    pub async fn create_checkout_session(&self, params: CreateCheckoutParams) -> Result<String> {
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), params.mode),
            ("line_items[0][price]".to_string(), params.price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), params.success_url),
            ("cancel_url".to_string(), params.cancel_url),
        ];

        for (key, value) in params.metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        #[derive(Deserialize)]
        struct CheckoutResp {
            url: Option<String>,
        }

        let parsed: CheckoutResp = self
            .post_form("/checkout/sessions", &body, "create checkout session")
            .await?;
        parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

/// Checks a `t=<ts>,v1=<hex>[,v1=<hex>...]` header against HMAC-SHA256 of
/// `<ts>.<payload>`, then parses the event. Any matching `v1` entry is accepted.
pub fn verify_signature(
    webhook_secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<StripeEvent> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let signed_at: i64 = timestamp
        .parse()
        .context("invalid timestamp in stripe-signature")?;
    if (now - signed_at).abs() > WEBHOOK_TOLERANCE_SECS {
        anyhow::bail!("webhook timestamp outside tolerance");
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|signature| match hex::decode(signature) {
        Ok(provided) => mac.clone().verify_slice(&provided).is_ok(),
        Err(_) => false,
    });
    if !matched {
        anyhow::bail!("invalid webhook signature");
    }

    let event: StripeEvent = serde_json::from_slice(payload).context("invalid webhook payload")?;
    Ok(event)
}

#[cfg(test)]
pub fn sign_payload(webhook_secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}
