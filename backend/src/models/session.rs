//! Server-side login sessions.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::{SessionId, UserId};

#[derive(Debug, Clone, Serialize, FromRow)]
/// One authenticated browser session.
pub struct Session {
    pub id: SessionId,
    /// `derive_lookup_id` of the bearer secret; the secret itself is never stored.
    #[serde(skip_serializing)]
    pub secret_hash: String,
    /// Identity provider session id (`sid`), unique when present.
    pub external_id: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Sliding expiry, pushed forward by every authenticated request.
    pub expires_at: DateTime<Utc>,
}

/// Why a stored session can no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    Idle,
    Absolute,
}

impl Session {
    /// Checks the idle and absolute limits at `now`.
    pub fn expiry_at(
        &self,
        now: DateTime<Utc>,
        absolute_timeout: Option<Duration>,
    ) -> Option<SessionExpiry> {
        if now > self.expires_at {
            return Some(SessionExpiry::Idle);
        }
        if let Some(limit) = absolute_timeout {
            if now > self.created_at + limit {
                return Some(SessionExpiry::Absolute);
            }
        }
        None
    }
}

/// Value carried by the session cookie: `<session id>:<raw secret>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub session_id: SessionId,
    pub secret: String,
}

impl SessionCookie {
    pub fn new(session_id: SessionId, secret: String) -> Self {
        Self { session_id, secret }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (id, secret) = value.split_once(':')?;
        if secret.is_empty() {
            return None;
        }
        let session_id = id.parse().ok()?;
        Some(Self {
            session_id,
            secret: secret.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.session_id, self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: SessionId::new(),
            secret_hash: "hash".into(),
            external_id: None,
            user_id: UserId::new(),
            created_at,
            expires_at,
        }
    }

    #[test]
    fn idle_expiry_is_strictly_after_expires_at() {
        let now = Utc::now();
        let s = session(now - Duration::seconds(600), now);
        assert_eq!(s.expiry_at(now, None), None);
        assert_eq!(
            s.expiry_at(now + Duration::seconds(1), None),
            Some(SessionExpiry::Idle)
        );
    }

    #[test]
    fn absolute_expiry_applies_when_configured() {
        let now = Utc::now();
        let s = session(now - Duration::hours(2), now + Duration::hours(1));
        assert_eq!(s.expiry_at(now, None), None);
        assert_eq!(
            s.expiry_at(now, Some(Duration::hours(1))),
            Some(SessionExpiry::Absolute)
        );
    }

    #[test]
    fn cookie_parses_id_and_secret() {
        let id = SessionId::new();
        let cookie = SessionCookie::new(id, "c2VjcmV0".into());
        let parsed = SessionCookie::parse(&cookie.encode()).expect("parse");
        assert_eq!(parsed, cookie);
    }

    #[test]
    fn cookie_rejects_malformed_values() {
        assert!(SessionCookie::parse("no-separator").is_none());
        assert!(SessionCookie::parse("not-a-uuid:secret").is_none());
        assert!(SessionCookie::parse(&format!("{}:", SessionId::new())).is_none());
    }
}
