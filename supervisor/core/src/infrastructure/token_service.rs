// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Supervisor token service.
//!
//! Stateless HS256 signer/verifier used to authenticate tool-use callbacks
//! from the sandboxed agent process back into the control plane. When no
//! secret is configured a random one is generated, so each instance has a
//! distinct secret and tokens are non-portable across instances. Expiry is
//! the only deactivation mechanism; there is no revocation list.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::domain::error::SupervisorError;

const ISSUER: &str = "aegis-supervisor";
const DEFAULT_TTL_MS: i64 = 3_600_000;
/// Seconds past `exp` a token is still accepted (clock skew between the
/// sandbox and the control plane).
const LEEWAY_SECS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub sub: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            default_ttl: Duration::milliseconds(DEFAULT_TTL_MS),
        }
    }

    /// Instance-local random secret; tokens will not validate elsewhere.
    pub fn with_random_secret() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self::new(&secret)
    }

    pub fn issue_token(
        &self,
        agent_id: &str,
        sandbox_id: Option<String>,
        ttl: Option<Duration>,
    ) -> IssuedToken {
        self.issue_token_at(agent_id, sandbox_id, ttl, Utc::now())
    }

    fn issue_token_at(
        &self,
        agent_id: &str,
        sandbox_id: Option<String>,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> IssuedToken {
        let expires_at = now + ttl.unwrap_or(self.default_ttl);
        let claims = TokenClaims {
            sub: agent_id.to_string(),
            agent_id: agent_id.to_string(),
            sandbox_id,
            iss: ISSUER.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .expect("HS256 signing of plain claims cannot fail");
        IssuedToken { token, expires_at }
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, SupervisorError> {
        self.validate_token_at(token, Utc::now())
    }

    /// Expiry is checked here against an explicit `now` (with the skew
    /// leeway) rather than by the JWT library, so callers and tests control
    /// the clock.
    fn validate_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, SupervisorError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| SupervisorError::Unauthorized(format!("Invalid token: {e}")))?;

        if now.timestamp() > data.claims.exp + LEEWAY_SECS {
            return Err(SupervisorError::unauthorized("Token expired"));
        }
        Ok(data.claims)
    }

    pub fn renew_token(
        &self,
        token: &str,
        agent_id: &str,
    ) -> Result<IssuedToken, SupervisorError> {
        self.renew_token_at(token, agent_id, Utc::now())
    }

    fn renew_token_at(
        &self,
        token: &str,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, SupervisorError> {
        let claims = self.validate_token_at(token, now)?;
        if claims.agent_id != agent_id {
            return Err(SupervisorError::unauthorized("agentId mismatch"));
        }
        // New expiry is the default TTL from now, not from the old expiry.
        Ok(self.issue_token_at(agent_id, claims.sandbox_id, None, now))
    }
}
