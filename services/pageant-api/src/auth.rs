//! Credentials and sessions.
//!
//! - [`CredentialHasher`]: salted, iterated BLAKE3 password hashes
//! - [`SessionSigner`]: Ed25519-signed bearer tokens
//! - [`AuthUser`] / [`AdminUser`]: extractors that verify the token and
//!   reload the account on every request

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use pageant_core::{Account, AccountId, Role};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

const SALT_LEN: usize = 16;
const HASH_SCHEME: &str = "blake3";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,
}

/// Password hashing contract
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// `blake3$<iterations>$<salt hex>$<digest hex>`
#[derive(Debug, Clone)]
pub struct Blake3Hasher {
    iterations: u32,
}

impl Blake3Hasher {
    pub const DEFAULT_ITERATIONS: u32 = 50_000;

    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    fn derive(&self, iterations: u32, salt: &[u8], password: &str) -> blake3::Hash {
        let mut digest = {
            let mut hasher = blake3::Hasher::new();
            hasher.update(salt);
            hasher.update(password.as_bytes());
            hasher.finalize()
        };
        for _ in 1..iterations {
            let mut hasher = blake3::Hasher::new();
            hasher.update(digest.as_bytes());
            hasher.update(salt);
            digest = hasher.finalize();
        }
        digest
    }
}

impl Default for Blake3Hasher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ITERATIONS)
    }
}

impl CredentialHasher for Blake3Hasher {
    fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let digest = self.derive(self.iterations, &salt, password);
        format!(
            "{HASH_SCHEME}${}${}${}",
            self.iterations,
            hex::encode(salt),
            digest.to_hex()
        )
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.split('$');
        let (Some(HASH_SCHEME), Some(iterations), Some(salt), Some(digest), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        let (Ok(iterations), Ok(salt), Ok(expected)) = (
            iterations.parse::<u32>(),
            hex::decode(salt),
            blake3::Hash::from_hex(digest),
        ) else {
            return false;
        };
        if iterations == 0 {
            return false;
        }
        // blake3::Hash equality is constant-time
        self.derive(iterations, &salt, password) == expected
    }
}

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: AccountId,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies `base64url(claims).base64url(signature)` tokens
#[derive(Clone)]
pub struct SessionSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl: Duration,
}

impl SessionSigner {
    pub fn from_seed(seed: &[u8; 32], ttl: Duration) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
            ttl,
        }
    }

    /// Fresh random key; tokens die with the process
    pub fn ephemeral(ttl: Duration) -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed, ttl)
    }

    pub fn issue(&self, account: AccountId, now: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: account,
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl.as_secs() as i64,
        };
        // Plain struct of uuid and integers; serialization is infallible
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signature = self.signing_key.sign(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::MalformedToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedToken)?;
        let signature =
            Signature::from_slice(&signature).map_err(|_| AuthError::MalformedToken)?;

        self.verifying_key
            .verify_strict(&payload, &signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedToken)?;
        if claims.exp <= now.timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticated caller, reloaded from the store
#[derive(Debug, Clone)]
pub struct AuthUser(pub Account);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(ApiError::not_authorized)?;
        let claims = state.sessions.verify(token, Utc::now()).map_err(|e| {
            debug!(error = %e, "Rejected session token");
            ApiError::not_authorized()
        })?;

        let account = state
            .with_store(move |store| store.find_account(claims.sub))
            .await?
            .ok_or_else(ApiError::not_authorized)?;

        Ok(AuthUser(account))
    }
}

/// Authenticated caller holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub Account);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(account) = AuthUser::from_request_parts(parts, state).await?;
        if !account.role.is_one_of(&[Role::Admin]) {
            return Err(ApiError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ));
        }
        Ok(AdminUser(account))
    }
}

/// Hash on the blocking pool
pub async fn hash_password(state: &AppState, password: String) -> Result<String, ApiError> {
    let hasher = Arc::clone(&state.hasher);
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))
}

/// Verify on the blocking pool
pub async fn verify_password(
    state: &AppState,
    password: String,
    stored: String,
) -> Result<bool, ApiError> {
    let hasher = Arc::clone(&state.hasher);
    tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))
}
