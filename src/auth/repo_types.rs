use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,                                 // unique user ID
    pub email: String,                            // natural lookup key, case-sensitive
    #[serde(skip_serializing)]
    #[sqlx(rename = "password")]
    pub password_hash: String,                    // Argon2 PHC string
    #[allow(dead_code)]
    #[serde(skip_serializing)]
    #[sqlx(rename = "reset_password_token")]
    pub reset_token_digest: Option<String>,       // SHA-256 of the outstanding reset token
    #[allow(dead_code)]
    #[serde(skip_serializing)]
    #[sqlx(rename = "reset_password_expires")]
    pub reset_token_expires_ms: Option<i64>,      // epoch milliseconds
    pub created_at: OffsetDateTime,
}
