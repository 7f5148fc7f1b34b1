use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Persistent user records. Every method is a single statement, so each one
/// is atomic on its own without application-level locking.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Inserts a new user. Returns `None` when the email is already taken.
    async fn insert(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>>;

    /// Overwrites any outstanding reset token of the account with `email`.
    /// Returns `None` when no such account exists.
    async fn set_reset_token(
        &self,
        email: &str,
        token_digest: &str,
        expires_ms: i64,
    ) -> anyhow::Result<Option<Uuid>>;

    /// Id of the user holding `token_digest` if it expires after `now_ms`.
    /// Read-only; `consume_reset_token` re-checks under the write.
    async fn find_by_reset_digest(
        &self,
        token_digest: &str,
        now_ms: i64,
    ) -> anyhow::Result<Option<Uuid>>;

    /// Swaps in `new_password_hash` and clears the reset columns, but only if
    /// `token_digest` is still stored and expires after `now_ms`.
    /// Returns the id of the updated user, `None` when nothing matched.
    async fn consume_reset_token(
        &self,
        token_digest: &str,
        now_ms: i64,
        new_password_hash: &str,
    ) -> anyhow::Result<Option<Uuid>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, reset_password_token, reset_password_expires, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn insert(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password)
            VALUES ($1, $2)
            RETURNING id, email, password, reset_password_token, reset_password_expires, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(user) => Ok(Some(user)),
            // lost a signup race against the same email
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e).context("insert user"),
        }
    }

    async fn set_reset_token(
        &self,
        email: &str,
        token_digest: &str,
        expires_ms: i64,
    ) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
               SET reset_password_token = $1,
                   reset_password_expires = $2
             WHERE email = $3
            RETURNING id
            "#,
        )
        .bind(token_digest)
        .bind(expires_ms)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("set reset token")?;
        Ok(id)
    }

    async fn find_by_reset_digest(
        &self,
        token_digest: &str,
        now_ms: i64,
    ) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM users
            WHERE reset_password_token = $1
              AND reset_password_expires > $2
            "#,
        )
        .bind(token_digest)
        .bind(now_ms)
        .fetch_optional(&self.db)
        .await
        .context("find user by reset token")?;
        Ok(id)
    }

    async fn consume_reset_token(
        &self,
        token_digest: &str,
        now_ms: i64,
        new_password_hash: &str,
    ) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
               SET password = $1,
                   reset_password_token = NULL,
                   reset_password_expires = NULL
             WHERE reset_password_token = $2
               AND reset_password_expires > $3
            RETURNING id
            "#,
        )
        .bind(new_password_hash)
        .bind(token_digest)
        .bind(now_ms)
        .fetch_optional(&self.db)
        .await
        .context("consume reset token")?;
        Ok(id)
    }
}
