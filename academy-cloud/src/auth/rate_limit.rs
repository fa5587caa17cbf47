//! Request shield: fixed-window rate limiting plus a user-agent bot check
//!
//! Checked before any mutation; a denial short-circuits the operation.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use shared::error::{AppError, ErrorCode};

/// Named fixed-window limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShieldRule {
    pub name: &'static str,
    pub max_requests: u32,
    pub window_secs: u64,
}

impl ShieldRule {
    /// Enroll-in-course: 5 per minute per user
    pub const CHECKOUT: ShieldRule = ShieldRule {
        name: "checkout",
        max_requests: 5,
        window_secs: 60,
    };
    /// Admin course mutations: 3 per minute per admin
    pub const ADMIN_WRITE: ShieldRule = ShieldRule {
        name: "admin_write",
        max_requests: 3,
        window_secs: 60,
    };
    /// Presigned uploads and object deletes: 3 per minute per admin
    pub const UPLOAD: ShieldRule = ShieldRule {
        name: "upload",
        max_requests: 3,
        window_secs: 60,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    RateLimit,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

impl Decision {
    /// Turn a denial into the error the caller should see
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(DenyReason::RateLimit) => Err(AppError::new(ErrorCode::RateLimited)),
            Decision::Denied(DenyReason::Bot) => Err(AppError::new(ErrorCode::BotDetected)),
        }
    }
}

/// Request metadata the shield inspects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

#[cfg(test)]
impl ClientInfo {
    pub fn browser(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64)".to_string()),
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(ClientInfo {
            ip: extract_ip(parts),
            user_agent,
        })
    }
}

/// Extract client IP: X-Forwarded-For header first (load balancer), then peer address.
fn extract_ip(parts: &Parts) -> String {
    if let Some(forwarded) = parts.headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
    {
        // X-Forwarded-For can be comma-separated; first entry is the original client
        if let Some(first) = val.split(',').next() {
            let ip = first.trim();
            if !ip.is_empty() {
                return ip.to_owned();
            }
        }
    }

    parts
        .extensions
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

const BOT_MARKERS: &[&str] = &[
    "bot", "crawler", "spider", "headless", "curl/", "wget/", "python-requests", "scrapy",
];

/// Missing user agent or a known automation marker
pub fn looks_automated(user_agent: Option<&str>) -> bool {
    match user_agent.map(str::trim) {
        None | Some("") => true,
        Some(ua) => {
            let ua = ua.to_ascii_lowercase();
            BOT_MARKERS.iter().any(|m| ua.contains(m))
        }
    }
}

/// Rate-limit collaborator
#[async_trait]
pub trait Shield: Send + Sync {
    async fn protect(&self, rule: ShieldRule, fingerprint: &str, client: &ClientInfo) -> Decision;
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    /// rule name -> (fingerprint -> entry)
    inner: Arc<Mutex<HashMap<&'static str, HashMap<String, WindowEntry>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    async fn check(&self, rule: ShieldRule, fingerprint: &str) -> bool {
        let mut map = self.inner.lock().await;
        let rule_map = map.entry(rule.name).or_default();
        let now = Instant::now();

        let entry = rule_map
            .entry(fingerprint.to_owned())
            .or_insert_with(|| WindowEntry {
                count: 0,
                window_start: now,
            });

        // Reset window if expired
        if now.duration_since(entry.window_start).as_secs() >= rule.window_secs {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= rule.max_requests
    }

    /// Remove entries older than 5 minutes
    pub async fn cleanup(&self) {
        let mut map = self.inner.lock().await;
        let cutoff = std::time::Duration::from_secs(300);
        let now = Instant::now();

        for rule_map in map.values_mut() {
            rule_map.retain(|_, entry| now.duration_since(entry.window_start) < cutoff);
        }

        map.retain(|_, rule_map| !rule_map.is_empty());
    }
}

#[async_trait]
impl Shield for RateLimiter {
    async fn protect(&self, rule: ShieldRule, fingerprint: &str, client: &ClientInfo) -> Decision {
        if looks_automated(client.user_agent.as_deref()) {
            tracing::warn!(rule = rule.name, ip = %client.ip, "Automated client blocked");
            return Decision::Denied(DenyReason::Bot);
        }
        if !self.check(rule, fingerprint).await {
            tracing::warn!(rule = rule.name, fingerprint, "Rate limit exceeded");
            return Decision::Denied(DenyReason::RateLimit);
        }
        Decision::Allowed
    }
}
