use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::stripe_client::{
    CreateCheckoutParams, StripeCheckoutSession, StripeClient, StripeEvent, StripeLineItem,
    StripePrice, StripeSubscription,
};

/// The slice of the Stripe API the use cases depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> AnyResult<StripeSubscription>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> AnyResult<StripeCheckoutSession>;

    async fn list_checkout_line_items(&self, session_id: &str) -> AnyResult<Vec<StripeLineItem>>;

    async fn retrieve_price(&self, price_id: &str) -> AnyResult<StripePrice>;

    async fn list_prices(&self, product_id: &str) -> AnyResult<Vec<StripePrice>>;

    async fn create_checkout_session(&self, params: CreateCheckoutParams) -> AnyResult<String>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> AnyResult<StripeSubscription> {
        self.set_cancel_at_period_end(subscription_id, cancel_at_period_end)
            .await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> AnyResult<StripeCheckoutSession> {
        self.retrieve_checkout_session(session_id).await
    }

    async fn list_checkout_line_items(&self, session_id: &str) -> AnyResult<Vec<StripeLineItem>> {
        self.list_checkout_line_items(session_id).await
    }

    async fn retrieve_price(&self, price_id: &str) -> AnyResult<StripePrice> {
        self.retrieve_price(price_id).await
    }

    async fn list_prices(&self, product_id: &str) -> AnyResult<Vec<StripePrice>> {
        self.list_prices(product_id).await
    }

    async fn create_checkout_session(&self, params: CreateCheckoutParams) -> AnyResult<String> {
        self.create_checkout_session(params).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}
