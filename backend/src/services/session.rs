//! Login handoff and cookie sessions.
//!
//! A verified login token establishes (or re-keys) a server-side session; the
//! browser then carries `<session id>:<secret>` in a cookie. Every step that
//! races with another request for the same session is a single conditional
//! statement against the store.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    config::Config,
    models::{
        session::{Session, SessionCookie},
        user::{User, UserIdentity},
    },
    repositories::{session as session_repo, user as user_repo},
    types::SessionId,
    utils::{
        jwt::{verify_login_token, verify_logout_token},
        token::{generate_secret_with_lookup_id, secret_matches},
    },
};

/// Outcome of a successful login-token handoff.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub user: User,
    pub session: Session,
    /// Cookie to hand back to the browser; holds the only copy of the secret.
    pub cookie: SessionCookie,
}

#[derive(Clone)]
pub struct SessionManager {
    pool: PgPool,
    config: Config,
}

impl SessionManager {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config }
    }

    /// Verifies a login token and upserts the user and the session.
    ///
    /// An invalid token is not an error: it is logged and yields `None`. A
    /// repeat login carrying the same `sid` rewrites that session in place,
    /// so the previous cookie stops authenticating.
    pub async fn login_with_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EstablishedSession>, sqlx::Error> {
        let claims = match verify_login_token(token, &self.config.login_token_secret) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected login token");
                return Ok(None);
            }
        };

        let identity = UserIdentity {
            sub: claims.sub,
            email: claims.email,
            name: claims.name,
        };
        let user = user_repo::upsert_user_by_sub(&self.pool, &identity).await?;

        let (secret, secret_hash) = generate_secret_with_lookup_id();
        let session = session_repo::upsert_session(
            &self.pool,
            &secret_hash,
            claims.sid.as_deref(),
            user.id,
            now,
            now + self.config.idle_timeout(),
        )
        .await?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            has_sid = session.external_id.is_some(),
            "Session established from login token"
        );

        Ok(Some(EstablishedSession {
            cookie: SessionCookie::new(session.id, secret),
            user,
            session,
        }))
    }

    /// Resolves a session cookie and slides the session's expiry forward.
    ///
    /// Expired sessions are deleted on sight. A secret mismatch leaves the
    /// row alone.
    pub async fn resume(
        &self,
        cookie_value: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(User, Session)>, sqlx::Error> {
        let Some(cookie) = SessionCookie::parse(cookie_value) else {
            tracing::debug!("Malformed session cookie");
            return Ok(None);
        };
        let Some(session) = session_repo::find_session_by_id(&self.pool, cookie.session_id).await?
        else {
            return Ok(None);
        };

        let absolute_timeout = self.config.absolute_timeout();
        if let Some(reason) = session.expiry_at(now, absolute_timeout) {
            let created_before = absolute_timeout.map(|limit| now - limit);
            session_repo::delete_expired_session(&self.pool, session.id, now, created_before)
                .await?;
            tracing::info!(session_id = %session.id, ?reason, "Session expired");
            return Ok(None);
        }

        if !secret_matches(&cookie.secret, &session.secret_hash) {
            tracing::warn!(session_id = %session.id, "Session secret mismatch");
            return Ok(None);
        }

        let expires_at = now + self.config.idle_timeout();
        let slid = session_repo::slide_session_expiry(
            &self.pool,
            session.id,
            &session.secret_hash,
            expires_at,
        )
        .await?;
        if !slid {
            // Deleted or re-keyed since it was read.
            return Ok(None);
        }

        let Some(user) = user_repo::find_user_by_id(&self.pool, session.user_id).await? else {
            return Ok(None);
        };

        let expires_at = session.expires_at.max(expires_at);
        Ok(Some((
            user,
            Session {
                expires_at,
                ..session
            },
        )))
    }

    /// Terminates the sessions named by a backchannel logout token.
    ///
    /// Returns `false` without touching the store when the token does not
    /// verify as a logout token.
    pub async fn process_backchannel_logout(&self, token: &str) -> Result<bool, sqlx::Error> {
        let claims = match verify_logout_token(token, &self.config.login_token_secret) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected backchannel logout token");
                return Ok(false);
            }
        };

        let removed = session_repo::delete_sessions_by_external_id(&self.pool, &claims.sid).await?;
        tracing::info!(removed, "Backchannel logout processed");
        Ok(true)
    }

    /// Explicit logout of the current session.
    pub async fn logout(&self, session_id: SessionId) -> Result<bool, sqlx::Error> {
        let removed = session_repo::delete_session_by_id(&self.pool, session_id).await?;
        if removed {
            tracing::info!(%session_id, "Session logged out");
        }
        Ok(removed)
    }

    /// Deletes every session past its idle or absolute limit.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let created_before = self.config.absolute_timeout().map(|limit| now - limit);
        session_repo::cleanup_expired_sessions(&self.pool, now, created_before).await
    }

    /// Lifetime given to the session cookie.
    pub fn cookie_max_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.session_idle_timeout_seconds)
    }
}
