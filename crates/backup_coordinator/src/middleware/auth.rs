//! Authentication and authorization for the protected routes

use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpMessage, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::models::error::{ConfigError, CoordinatorError};
use crate::models::types::Claims;

/// Roles allowed to schedule, list, create and restore backups.
pub const PRIVILEGED_ROLES: [&str; 2] = ["ADMIN", "SYSADMIN"];

/// Verifies HS256 bearer tokens against a pre-shared key.
pub struct AuthGate {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl AuthGate {
    /// Builds the gate from a base64 encoded key. Without a key every token is rejected.
    pub fn from_base64_secret(secret: Option<&SecretString>) -> Result<Self, ConfigError> {
        let key = match secret {
            Some(secret) => Some(
                DecodingKey::from_base64_secret(secret.expose_secret().trim()).map_err(|e| {
                    ConfigError::Invalid(format!("auth.jwt_secret is not valid base64: {}", e))
                })?,
            ),
            None => {
                warn!("No JWT secret configured, all protected routes will reject requests");
                None
            }
        };

        // Tokens are issued externally; `aud` is not checked.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, CoordinatorError> {
        let key = self.key.as_ref().ok_or_else(|| {
            CoordinatorError::AuthenticationInvalid("token verification key not configured".into())
        })?;

        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| CoordinatorError::AuthenticationInvalid(e.to_string()))
    }

    /// Checks the bearer token and role of `req`, attaching the claims to the request on success.
    pub fn authorize(&self, req: &HttpRequest) -> Result<Claims, CoordinatorError> {
        let token = bearer_token(req).ok_or(CoordinatorError::AuthenticationMissing)?;
        let claims = self.verify(token)?;

        if !PRIVILEGED_ROLES.contains(&claims.role.as_str()) {
            debug!(role = %claims.role, path = %req.path(), "Rejected request with unprivileged role");
            return Err(CoordinatorError::AuthorizationDenied(claims.role));
        }

        req.extensions_mut().insert(claims.clone());
        Ok(claims)
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
