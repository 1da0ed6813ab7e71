use crate::config;

use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{
    Claims, Duration as JwtDuration, HS256Key, NoCustomClaims, VerificationOptions,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use std::collections::HashSet;

/// Bearer-token gate for the API. The signed subject is the user id every
/// user-scoped surface (timer, reminders) operates on.
#[derive(Debug, Clone)]
pub struct AuthState {
    key: HS256Key,
    issuer: String,
    token_ttl: time::Duration,
}

#[derive(Debug)]
pub enum AuthError {
    InvalidKey,
    InvalidToken,
    MissingExpiry,
    MissingSubject,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidKey => f.write_str("invalid auth key"),
            AuthError::InvalidToken => f.write_str("invalid auth token"),
            AuthError::MissingExpiry => f.write_str("auth token missing expiry"),
            AuthError::MissingSubject => f.write_str("auth token missing subject"),
        }
    }
}

impl AuthState {
    pub fn from_config(config: &config::AppConfig) -> Result<Option<Self>, AuthError> {
        let Some(auth) = config.auth.as_ref() else {
            return Ok(None);
        };
        Self::from_parts(&auth.key, &config.app_name, auth.token_ttl).map(Some)
    }

    pub fn from_parts(
        key: &str,
        issuer: &str,
        token_ttl: time::Duration,
    ) -> Result<Self, AuthError> {
        let key_bytes = decode_key(key)?;
        Ok(Self {
            key: HS256Key::from_bytes(&key_bytes),
            issuer: issuer.to_string(),
            token_ttl,
        })
    }

    pub fn issue_token(&self, subject: &str) -> Result<String, AuthError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        let ttl_seconds = self.token_ttl.whole_seconds();
        if ttl_seconds <= 0 {
            return Err(AuthError::InvalidToken);
        }
        let claims = Claims::create(JwtDuration::from_secs(ttl_seconds as u64))
            .with_subject(subject)
            .with_issuer(&self.issuer);
        self.key
            .authenticate(claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Verifies signature, expiry, and issuer; returns the user id.
    pub fn verify_token(&self, token: &str) -> Result<String, AuthError> {
        let mut options = VerificationOptions::default();
        let mut issuers = HashSet::new();
        issuers.insert(self.issuer.clone());
        options.allowed_issuers = Some(issuers);

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.expires_at.is_none() {
            return Err(AuthError::MissingExpiry);
        }

        let subject = claims.subject.ok_or(AuthError::MissingSubject)?;
        if subject.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(subject)
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub fn generate_auth_key() -> Result<String, AuthError> {
    let mut rng = OsRng;
    generate_auth_key_with_rng(&mut rng)
}

pub(crate) fn generate_auth_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let encoded = encode_config(bytes, URL_SAFE_NO_PAD);
    if encoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }
    Ok(encoded)
}
