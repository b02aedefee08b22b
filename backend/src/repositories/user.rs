use sqlx::{PgConnection, PgPool};

use crate::{
    models::user::{User, UserIdentity},
    types::UserId,
};

const USER_COLUMNS: &str = "id, sub, email, name, created_at, updated_at";

/// Creates the user for `identity.sub` or refreshes its name and email.
pub async fn upsert_user_by_sub(pool: &PgPool, identity: &UserIdentity) -> Result<User, sqlx::Error> {
    let query = format!(
        "INSERT INTO users (id, sub, email, name) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (sub) DO UPDATE SET \
             email = EXCLUDED.email, \
             name = EXCLUDED.name, \
             updated_at = CASE \
                 WHEN users.email IS DISTINCT FROM EXCLUDED.email \
                   OR users.name IS DISTINCT FROM EXCLUDED.name THEN NOW() \
                 ELSE users.updated_at \
             END \
         RETURNING {}",
        USER_COLUMNS
    );
    sqlx::query_as::<_, User>(&query)
        .bind(UserId::new())
        .bind(&identity.sub)
        .bind(&identity.email)
        .bind(&identity.name)
        .fetch_one(pool)
        .await
}

pub async fn find_user_by_id(pool: &PgPool, user_id: UserId) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Takes the user's row lock for the rest of the transaction, serialising that
/// user's booking claims.
pub async fn lock_user(conn: &mut PgConnection, user_id: UserId) -> Result<bool, sqlx::Error> {
    let locked = sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(locked.is_some())
}
