// Payment gateway adapters. Both gateways are driven through their REST APIs
// with reqwest; the completion endpoint talks to them through the
// `PaymentGateway` trait so verification reads the same for Stripe and PayPal.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::env;
use thiserror::Error;

use crate::models::orders;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("missing configuration: {0}")]
    Config(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway rejected the request: {0}")]
    Gateway(String),
    #[error("invalid order amount")]
    InvalidAmount,
}

/// Outcome of asking a gateway whether a payment reference is settled.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub paid: bool,
    /// Gateway-side payment id to store on the order (Stripe payment intent,
    /// PayPal order id).
    pub payment_id: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Re-verify a client-supplied payment reference against the gateway.
    async fn verify_payment(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError>;
}

fn require_env(name: &str) -> Result<String, PaymentError> {
    env::var(name).map_err(|_| PaymentError::Config(format!("{} must be set", name)))
}

// ============== Stripe ==============

const STRIPE_API_BASE: &str = "https://api.stripe.com";

pub struct StripeClient {
    secret_key: String,
    frontend_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
}

impl StripeClient {
    pub fn from_env() -> Result<Self, PaymentError> {
        Ok(StripeClient {
            secret_key: require_env("STRIPE_SECRET_KEY")?,
            frontend_url: env::var("FRONTEND_SITE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            http: reqwest::Client::new(),
        })
    }

    /// Stripe wants the amount in cents.
    fn amount_in_cents(total: Decimal) -> Result<i64, PaymentError> {
        (total * Decimal::from(100))
            .trunc()
            .to_i64()
            .filter(|cents| *cents > 0)
            .ok_or(PaymentError::InvalidAmount)
    }

    /// Create a Checkout Session for an order. The session id is stored on
    /// the order and re-verified on the success callback.
    pub async fn create_checkout_session(
        &self,
        order: &orders::Model,
        customer_email: &str,
    ) -> Result<StripeCheckoutSession, PaymentError> {
        let cents = Self::amount_in_cents(order.total)?;
        let success_url = format!(
            "{}/payment-success/?order_id={}&session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url, order.order_id
        );
        let cancel_url = format!("{}/checkout/{}/", self.frontend_url, order.order_id);
        let product_name = format!("Order #{}", order.order_id);
        let cents_str = cents.to_string();

        let params: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("customer_email", customer_email),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", "usd"),
            ("line_items[0][price_data][product_data][name]", &product_name),
            ("line_items[0][price_data][unit_amount]", &cents_str),
            ("line_items[0][quantity]", "1"),
            ("success_url", &success_url),
            ("cancel_url", &cancel_url),
            ("metadata[order_id]", &order.order_id),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", STRIPE_API_BASE))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(body));
        }

        Ok(response.json::<StripeCheckoutSession>().await?)
    }

    pub async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<StripeCheckoutSession, PaymentError> {
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{}", STRIPE_API_BASE, session_id))
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(body));
        }

        Ok(response.json::<StripeCheckoutSession>().await?)
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn verify_payment(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError> {
        let session = self.retrieve_session(reference).await?;
        Ok(PaymentConfirmation {
            paid: session.payment_status.as_deref() == Some("paid"),
            payment_id: session.payment_intent,
        })
    }
}

// ============== PayPal ==============

pub struct PayPalClient {
    client_id: String,
    client_secret: String,
    api_base: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PayPalTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
}

impl PayPalClient {
    pub fn from_env() -> Result<Self, PaymentError> {
        Ok(PayPalClient {
            client_id: require_env("PAYPAL_CLIENT_ID")?,
            client_secret: require_env("PAYPAL_CLIENT_SECRET")?,
            api_base: env::var("PAYPAL_API_BASE")
                .unwrap_or_else(|_| "https://api-m.paypal.com".to_string()),
            http: reqwest::Client::new(),
        })
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(body));
        }

        Ok(response.json::<PayPalTokenResponse>().await?.access_token)
    }

    /// Look up a PayPal order server-side. The client-supplied order id is
    /// never trusted on its own; the order must exist and be COMPLETED.
    pub async fn retrieve_order(&self, paypal_order_id: &str) -> Result<PayPalOrder, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}/v2/checkout/orders/{}", self.api_base, paypal_order_id))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(body));
        }

        Ok(response.json::<PayPalOrder>().await?)
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    async fn verify_payment(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError> {
        let order = self.retrieve_order(reference).await?;
        Ok(PaymentConfirmation {
            paid: order.status == "COMPLETED",
            payment_id: Some(order.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_amount_in_cents() {
        let total = Decimal::from_str("39.99").unwrap();
        assert_eq!(StripeClient::amount_in_cents(total).unwrap(), 3999);
    }

    #[test]
    fn test_zero_amount_rejected() {
        assert!(matches!(
            StripeClient::amount_in_cents(Decimal::ZERO),
            Err(PaymentError::InvalidAmount)
        ));
    }

    #[test]
    fn test_stripe_session_parsing() {
        let json = r#"{
            "id": "cs_test_123",
            "object": "checkout.session",
            "payment_status": "paid",
            "payment_intent": "pi_abc",
            "url": null
        }"#;
        let session: StripeCheckoutSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert_eq!(session.payment_status.as_deref(), Some("paid"));
        assert_eq!(session.payment_intent.as_deref(), Some("pi_abc"));
    }

    #[test]
    fn test_paypal_order_parsing() {
        let json = r#"{"id": "5O190127TN364715T", "status": "COMPLETED", "intent": "CAPTURE"}"#;
        let order: PayPalOrder = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, "COMPLETED");
    }
}
