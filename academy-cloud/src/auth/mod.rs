//! Authentication and request shielding

pub mod rate_limit;
pub mod session_auth;

use async_trait::async_trait;
use shared::models::{User, UserRole};

use crate::error::ServiceResult;

pub use rate_limit::{ClientInfo, Decision, DenyReason, RateLimiter, Shield, ShieldRule};

/// Authenticated caller, passed explicitly into every operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl UserIdentity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Local mirror of users issued by the auth service
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert the user on first sight, refresh email/name/role afterwards
    async fn ensure_user(&self, identity: &UserIdentity) -> ServiceResult<User>;

    /// Remember the payment-provider customer for this user
    async fn set_stripe_customer(&self, user_id: &str, customer_id: &str) -> ServiceResult<()>;
}
