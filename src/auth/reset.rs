use std::fmt;
use std::sync::Arc;

use axum::extract::FromRef;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    error::{AuthError, AuthResult},
    repo::UserStore,
    services::CredentialManager,
    validation::validate_new_password,
};
use crate::state::AppState;

const TOKEN_BYTES: usize = 20;

/// A freshly issued reset token. The plaintext exists only here, never in
/// the store.
pub struct IssuedToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest kept in the store in place of the token. The token already has
/// 160 bits of entropy, so a fast hash is enough.
pub(crate) fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn epoch_ms(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn now_ms() -> i64 {
    epoch_ms(OffsetDateTime::now_utc())
}

/// Issues and consumes single-use, time-limited password reset tokens.
#[derive(Clone)]
pub struct ResetTokenManager {
    store: Arc<dyn UserStore>,
    credentials: CredentialManager,
    ttl: Duration,
}

impl FromRef<AppState> for ResetTokenManager {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            CredentialManager::from_ref(state),
            Duration::minutes(state.config.auth.reset_token_ttl_minutes),
        )
    }
}

impl ResetTokenManager {
    pub fn new(store: Arc<dyn UserStore>, credentials: CredentialManager, ttl: Duration) -> Self {
        Self {
            store,
            credentials,
            ttl,
        }
    }

    /// Issues a token for `email`, superseding any outstanding one.
    #[instrument(skip(self))]
    pub async fn issue_reset_token(&self, email: &str) -> AuthResult<IssuedToken> {
        let token = generate_token();
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(self.ttl)
            .ok_or_else(|| anyhow::anyhow!("reset token expiry out of range (ttl {:?})", self.ttl))?;

        let user_id = self
            .store
            .set_reset_token(email, &token_digest(&token), epoch_ms(expires_at))
            .await?
            .ok_or_else(|| {
                warn!(email, "reset requested for unknown email");
                AuthError::AccountNotFound
            })?;

        info!(%user_id, %expires_at, "reset token issued");
        Ok(IssuedToken {
            user_id,
            token,
            expires_at,
        })
    }

    /// Sets a new password if `token` is outstanding and unexpired, clearing
    /// the token in the same update. Two concurrent calls with one token
    /// cannot both succeed.
    #[instrument(skip(self, token, new_password))]
    pub async fn consume_reset_token(&self, token: &str, new_password: &str) -> AuthResult<Uuid> {
        validate_new_password(new_password, self.credentials.min_password_length())?;

        let digest = token_digest(token);
        // skips the argon2 cost for dead tokens; the guarded update below decides
        if self
            .store
            .find_by_reset_digest(&digest, now_ms())
            .await?
            .is_none()
        {
            warn!("reset token invalid or expired");
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let hash = self.credentials.hash(new_password).await?;

        match self
            .store
            .consume_reset_token(&digest, now_ms(), &hash)
            .await?
        {
            Some(user_id) => {
                info!(%user_id, "password reset");
                Ok(user_id)
            }
            None => {
                warn!("reset token invalid or expired");
                Err(AuthError::InvalidOrExpiredToken)
            }
        }
    }
}
