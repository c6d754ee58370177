//! Session identity for ledger operations.
//!
//! Authentication itself lives outside this crate. Operations only need the
//! owner id of the caller, resolved through a [`SessionProvider`].

use crate::config::AppConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Resolves the current user, if any.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_user(&self) -> Option<Uuid>;
}

#[async_trait]
impl<T: SessionProvider + ?Sized> SessionProvider for Arc<T> {
    async fn current_user(&self) -> Option<Uuid> {
        (**self).current_user().await
    }
}

/// Resolves the owner id or fails with `AuthError`.
pub async fn require_owner<S: SessionProvider + ?Sized>(session: &S) -> Result<Uuid, ServiceError> {
    session.current_user().await.ok_or_else(|| {
        warn!("Ledger operation attempted without an authenticated user");
        ServiceError::missing_owner()
    })
}

/// A session fixed at construction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSession {
    user: Option<Uuid>,
}

impl StaticSession {
    pub fn signed_in(user: Uuid) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_user(&self) -> Option<Uuid> {
        self.user
    }
}

/// Claim structure for bearer tokens issued by the authentication provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (owner id)
    pub email: Option<String>,
    pub role: Option<String>,
    pub exp: i64, // Expiration time
    pub iat: i64, // Issued at time
}

/// A session backed by an HS256 bearer token.
///
/// A missing, malformed or expired token resolves to no user.
#[derive(Clone)]
pub struct JwtSession {
    token: Option<String>,
    key: DecodingKey,
    validation: Validation,
}

impl JwtSession {
    pub fn new(secret: &str, token: Option<String>) -> Self {
        Self {
            token,
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Builds a session from an `Authorization` header value.
    pub fn from_bearer(secret: &str, header: &str) -> Self {
        let token = header
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self::new(secret, token)
    }

    /// Builds a bearer session with the configured secret.
    pub fn from_config(config: &AppConfig, header: &str) -> Result<Self, ServiceError> {
        let secret = config.jwt_secret.as_deref().ok_or_else(|| {
            ServiceError::AuthError("JWT sessions require jwt_secret to be configured".to_string())
        })?;
        Ok(Self::from_bearer(secret, header))
    }

    pub fn claims(&self) -> Option<Claims> {
        let token = self.token.as_deref()?;
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                None
            }
        }
    }
}

#[async_trait]
impl SessionProvider for JwtSession {
    async fn current_user(&self) -> Option<Uuid> {
        let claims = self.claims()?;
        Uuid::parse_str(&claims.sub).ok()
    }
}
