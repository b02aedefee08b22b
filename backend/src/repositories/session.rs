use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    models::session::Session,
    types::{SessionId, UserId},
};

const SESSION_COLUMNS: &str = "id, secret_hash, external_id, user_id, created_at, expires_at";

/// Inserts a session, or replaces the one holding the same `external_id`.
///
/// A repeat login with the same identity provider session id rewrites the
/// existing row in place (keeping its id) in one statement, so there is never
/// more than one row per `sid`.
pub async fn upsert_session(
    pool: &PgPool,
    secret_hash: &str,
    external_id: Option<&str>,
    user_id: UserId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Session, sqlx::Error> {
    let query = format!(
        "INSERT INTO sessions (id, secret_hash, external_id, user_id, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (external_id) DO UPDATE SET \
             secret_hash = EXCLUDED.secret_hash, \
             user_id = EXCLUDED.user_id, \
             created_at = EXCLUDED.created_at, \
             expires_at = EXCLUDED.expires_at \
         RETURNING {}",
        SESSION_COLUMNS
    );
    sqlx::query_as::<_, Session>(&query)
        .bind(SessionId::new())
        .bind(secret_hash)
        .bind(external_id)
        .bind(user_id)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(pool)
        .await
}

pub async fn find_session_by_id(
    pool: &PgPool,
    session_id: SessionId,
) -> Result<Option<Session>, sqlx::Error> {
    let query = format!("SELECT {} FROM sessions WHERE id = $1", SESSION_COLUMNS);
    sqlx::query_as::<_, Session>(&query)
        .bind(session_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_sessions_by_external_id(
    pool: &PgPool,
    external_id: &str,
) -> Result<Vec<Session>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM sessions WHERE external_id = $1",
        SESSION_COLUMNS
    );
    sqlx::query_as::<_, Session>(&query)
        .bind(external_id)
        .fetch_all(pool)
        .await
}

/// Pushes the expiry forward, but only while the row still carries the secret
/// that was just verified. A deleted or re-keyed session is left untouched.
pub async fn slide_session_expiry(
    pool: &PgPool,
    session_id: SessionId,
    secret_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE sessions SET expires_at = GREATEST(expires_at, $1) \
         WHERE id = $2 AND secret_hash = $3",
    )
    .bind(expires_at)
    .bind(session_id)
    .bind(secret_hash)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes the session only if it is still past one of its limits, so a
/// concurrent re-login that refreshed the row survives.
pub async fn delete_expired_session(
    pool: &PgPool,
    session_id: SessionId,
    now: DateTime<Utc>,
    created_before: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM sessions \
         WHERE id = $1 AND (expires_at < $2 OR ($3::timestamptz IS NOT NULL AND created_at < $3))",
    )
    .bind(session_id)
    .bind(now)
    .bind(created_before)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_session_by_id(pool: &PgPool, session_id: SessionId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_sessions_by_external_id(
    pool: &PgPool,
    external_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE external_id = $1")
        .bind(external_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn cleanup_expired_sessions(
    pool: &PgPool,
    now: DateTime<Utc>,
    created_before: Option<DateTime<Utc>>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM sessions \
         WHERE expires_at < $1 OR ($2::timestamptz IS NOT NULL AND created_at < $2)",
    )
    .bind(now)
    .bind(created_before)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
