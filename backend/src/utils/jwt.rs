//! Verification of tokens handed over by the external identity provider.
//!
//! Login tokens and backchannel logout tokens share one HS256 secret. Each
//! verifier rejects the other token's shape so a captured logout token can not
//! be replayed as a login and vice versa.

use std::collections::HashMap;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event key that marks a backchannel logout token.
pub const BACKCHANNEL_LOGOUT_EVENT: &str = "http://schemas.openid.net/event/backchannel-logout";

pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is signed with an unexpected algorithm")]
    InvalidAlgorithm,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unexpected token shape: {0}")]
    UnexpectedShape(&'static str),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => VerificationError::InvalidAlgorithm,
            ErrorKind::MissingRequiredClaim(claim) => {
                VerificationError::Malformed(format!("missing required claim `{}`", claim))
            }
            _ => VerificationError::Malformed(err.to_string()),
        }
    }
}

/// Claims carried by a login token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginClaims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub exp: i64,
    /// Identity provider session id, used to correlate backchannel logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<HashMap<String, Value>>,
}

/// Claims carried by a backchannel logout token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutClaims {
    pub exp: i64,
    pub iat: i64,
    pub sid: String,
    pub events: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// `Some` whenever the key is present, even as `null`.
    #[serde(
        default,
        deserialize_with = "claim_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub nonce: Option<Value>,
}

fn claim_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn validation() -> Validation {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.leeway = 0;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);
    validation
}

fn decode_claims<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, VerificationError> {
    let token_data = decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation(),
    )?;
    Ok(token_data.claims)
}

/// Verifies a login token: signature, algorithm, expiry and login claim shape.
pub fn verify_login_token(token: &str, secret: &str) -> Result<LoginClaims, VerificationError> {
    let claims: LoginClaims = decode_claims(token, secret)?;

    if claims
        .events
        .as_ref()
        .is_some_and(|events| events.contains_key(BACKCHANNEL_LOGOUT_EVENT))
    {
        return Err(VerificationError::UnexpectedShape(
            "login token carries a logout event",
        ));
    }
    if claims.sub.trim().is_empty() {
        return Err(VerificationError::UnexpectedShape("login token has empty sub"));
    }
    if claims.sid.as_deref().is_some_and(|sid| sid.trim().is_empty()) {
        return Err(VerificationError::UnexpectedShape("login token has empty sid"));
    }

    Ok(claims)
}

/// Verifies a backchannel logout token: it must carry the logout event and a
/// `sid`, and must not carry a `nonce`.
pub fn verify_logout_token(token: &str, secret: &str) -> Result<LogoutClaims, VerificationError> {
    let claims: LogoutClaims = decode_claims(token, secret)?;

    if claims.nonce.is_some() {
        return Err(VerificationError::UnexpectedShape(
            "logout token must not carry a nonce",
        ));
    }
    if !claims.events.contains_key(BACKCHANNEL_LOGOUT_EVENT) {
        return Err(VerificationError::UnexpectedShape(
            "logout token is missing the logout event",
        ));
    }
    if claims.sid.trim().is_empty() {
        return Err(VerificationError::UnexpectedShape("logout token has empty sid"));
    }

    Ok(claims)
}

/// Signs claims the way the identity provider does. Used by tests and tooling.
pub fn sign_token<T: Serialize>(claims: &T, secret: &str) -> anyhow::Result<String> {
    let token = encode(
        &Header::new(SIGNING_ALGORITHM),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Builds the `events` claim of a backchannel logout token.
pub fn logout_events() -> HashMap<String, Value> {
    HashMap::from([(
        BACKCHANNEL_LOGOUT_EVENT.to_string(),
        Value::Object(Default::default()),
    )])
}
