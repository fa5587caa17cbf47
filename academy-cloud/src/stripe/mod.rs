//! Stripe integration via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::error::BoxError;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Replay window for webhook timestamps
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("stripe request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stripe {endpoint} failed: {message}")]
    Api { endpoint: String, message: String },
}

/// Hosted checkout request
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// One-off product with a default price (a course)
#[derive(Debug, Clone)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    /// Smallest currency unit
    pub unit_amount: i64,
    pub currency: String,
    pub image_url: Option<String>,
}

/// Payment-provider collaborator
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Returns the customer ID
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        user_id: &str,
        idempotency_key: &str,
    ) -> Result<String, BoxError>;

    async fn create_checkout_session(
        &self,
        req: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BoxError>;

    /// Returns the default price ID
    async fn create_product(&self, req: &ProductRequest) -> Result<String, BoxError>;

    /// Deactivate the product behind a price
    async fn archive_product(&self, price_id: &str) -> Result<(), BoxError>;
}

/// Stripe REST client
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    async fn post_form(
        &self,
        endpoint: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<serde_json::Value, StripeError> {
        let mut req = self
            .http
            .post(format!("{}/{endpoint}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        let resp: serde_json::Value = req.send().await?.json().await?;
        check_api_error(endpoint, resp)
    }

    async fn get(&self, endpoint: &str) -> Result<serde_json::Value, StripeError> {
        let resp: serde_json::Value = self
            .http
            .get(format!("{}/{endpoint}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?
            .json()
            .await?;
        check_api_error(endpoint, resp)
    }
}

fn check_api_error(endpoint: &str, resp: serde_json::Value) -> Result<serde_json::Value, StripeError> {
    if let Some(err) = resp.get("error") {
        return Err(StripeError::Api {
            endpoint: endpoint.to_string(),
            message: err["message"].as_str().unwrap_or("unknown error").to_string(),
        });
    }
    Ok(resp)
}

fn required_str(endpoint: &str, resp: &serde_json::Value, field: &str) -> Result<String, StripeError> {
    resp[field]
        .as_str()
        .map(String::from)
        .ok_or_else(|| StripeError::Api {
            endpoint: endpoint.to_string(),
            message: format!("response missing `{field}`"),
        })
}

fn pair(k: &str, v: impl Into<String>) -> (String, String) {
    (k.to_string(), v.into())
}

/// Form fields for a payment-mode checkout session
pub fn checkout_form(req: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        pair("customer", &req.customer_id),
        pair("mode", "payment"),
        pair("line_items[0][price]", &req.price_id),
        pair("line_items[0][quantity]", "1"),
        pair("success_url", &req.success_url),
        pair("cancel_url", &req.cancel_url),
    ];
    for (k, v) in &req.metadata {
        form.push((format!("metadata[{k}]"), v.clone()));
    }
    form
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        user_id: &str,
        idempotency_key: &str,
    ) -> Result<String, BoxError> {
        let form = [
            pair("email", email),
            pair("name", name),
            pair("metadata[user_id]", user_id),
        ];
        let resp = self
            .post_form("customers", &form, Some(idempotency_key))
            .await?;
        Ok(required_str("customers", &resp, "id")?)
    }

    async fn create_checkout_session(
        &self,
        req: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BoxError> {
        let resp = self
            .post_form(
                "checkout/sessions",
                &checkout_form(req),
                Some(&req.idempotency_key),
            )
            .await?;
        Ok(CheckoutSession {
            id: required_str("checkout/sessions", &resp, "id")?,
            url: required_str("checkout/sessions", &resp, "url")?,
        })
    }

    async fn create_product(&self, req: &ProductRequest) -> Result<String, BoxError> {
        let mut form = vec![
            pair("name", &req.name),
            pair("description", &req.description),
            pair("default_price_data[currency]", &req.currency),
            pair("default_price_data[unit_amount]", req.unit_amount.to_string()),
        ];
        if let Some(url) = &req.image_url {
            form.push(pair("images[0]", url));
        }
        let resp = self.post_form("products", &form, None).await?;
        Ok(required_str("products", &resp, "default_price")?)
    }

    async fn archive_product(&self, price_id: &str) -> Result<(), BoxError> {
        let endpoint = format!("prices/{price_id}");
        let price = self.get(&endpoint).await?;
        let product_id = required_str(&endpoint, &price, "product")?;
        self.post_form(
            &format!("products/{product_id}"),
            &[pair("active", "false")],
            None,
        )
        .await?;
        Ok(())
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    verify_webhook_signature_at(payload, sig_header, secret, chrono::Utc::now().timestamp())
}

fn verify_webhook_signature_at(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.trim().strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Stripe may send several v1 signatures during secret rotation
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err("Webhook signature mismatch");
    }

    // Reject events older than 5 minutes to prevent replay attacks
    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// Build a `Stripe-Signature` header value for `payload` signed at `timestamp`
#[cfg(test)]
pub fn sign_webhook(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={sig}")
}
