use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    error::{AuthError, AuthResult},
    password::{hash_password, verify_password},
    repo::UserStore,
    validation::validate_credentials,
};
use crate::state::AppState;

/// Signup and login against stored Argon2 hashes.
#[derive(Clone)]
pub struct CredentialManager {
    store: Arc<dyn UserStore>,
    min_password_length: usize,
}

impl FromRef<AppState> for CredentialManager {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.config.auth.min_password_length)
    }
}

impl CredentialManager {
    pub fn new(store: Arc<dyn UserStore>, min_password_length: usize) -> Self {
        Self {
            store,
            min_password_length,
        }
    }

    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    /// Creates an account, writing exactly one record or none.
    #[instrument(skip(self, password))]
    pub async fn create_account(&self, email: &str, password: &str) -> AuthResult<Uuid> {
        validate_credentials(email, password, self.min_password_length)?;

        if self.store.find_by_email(email).await?.is_some() {
            warn!(email, "email already registered");
            return Err(AuthError::DuplicateAccount);
        }

        let hash = self.hash(password).await?;
        match self.store.insert(email, &hash).await? {
            Some(user) => {
                info!(user_id = %user.id, email, "user registered");
                Ok(user.id)
            }
            None => {
                warn!(email, "email registered concurrently");
                Err(AuthError::DuplicateAccount)
            }
        }
    }

    /// Verifies an email/password pair. Stateless: no lockout, no counters.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<Uuid> {
        let user = self.store.find_by_email(email).await?.ok_or_else(|| {
            warn!(email, "login unknown email");
            AuthError::AccountNotFound
        })?;

        let plain = password.to_owned();
        let stored = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
            .await
            .context("verify task")??;

        if !ok {
            warn!(email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        info!(user_id = %user.id, email, "user logged in");
        Ok(user.id)
    }

    /// Argon2 is deliberately slow, so it runs off the async workers.
    pub(crate) async fn hash(&self, password: &str) -> AuthResult<String> {
        let plain = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
            .await
            .context("hash task")??;
        Ok(hash)
    }
}
