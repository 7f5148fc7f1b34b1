use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::User;

/// Same predicate as the SQL `reset_password_token = $ AND reset_password_expires > $now`.
fn holds_live_token(user: &User, token_digest: &str, now_ms: i64) -> bool {
    user.reset_token_digest.as_deref() == Some(token_digest)
        && matches!(user.reset_token_expires_ms, Some(exp) if exp > now_ms)
}

/// In-memory `UserStore` keyed by email. The mutex makes each call atomic,
/// the same guarantee a single SQL statement gives `PgUserStore`.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, email: &str) -> Option<User> {
        self.users.lock().ok()?.get(email).cloned()
    }

    pub fn count(&self) -> usize {
        self.users.lock().map(|u| u.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().map_err(|_| anyhow!("user map poisoned"))?;
        Ok(users.get(email).cloned())
    }

    async fn insert(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().map_err(|_| anyhow!("user map poisoned"))?;
        if users.contains_key(email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            reset_token_digest: None,
            reset_token_expires_ms: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(email.to_string(), user.clone());
        Ok(Some(user))
    }

    async fn set_reset_token(
        &self,
        email: &str,
        token_digest: &str,
        expires_ms: i64,
    ) -> anyhow::Result<Option<Uuid>> {
        let mut users = self.users.lock().map_err(|_| anyhow!("user map poisoned"))?;
        Ok(users.get_mut(email).map(|u| {
            u.reset_token_digest = Some(token_digest.to_string());
            u.reset_token_expires_ms = Some(expires_ms);
            u.id
        }))
    }

    async fn find_by_reset_digest(
        &self,
        token_digest: &str,
        now_ms: i64,
    ) -> anyhow::Result<Option<Uuid>> {
        let users = self.users.lock().map_err(|_| anyhow!("user map poisoned"))?;
        Ok(users
            .values()
            .find(|u| holds_live_token(u, token_digest, now_ms))
            .map(|u| u.id))
    }

    async fn consume_reset_token(
        &self,
        token_digest: &str,
        now_ms: i64,
        new_password_hash: &str,
    ) -> anyhow::Result<Option<Uuid>> {
        let mut users = self.users.lock().map_err(|_| anyhow!("user map poisoned"))?;
        let found = users
            .values_mut()
            .find(|u| holds_live_token(u, token_digest, now_ms));
        Ok(found.map(|u| {
            u.password_hash = new_password_hash.to_string();
            u.reset_token_digest = None;
            u.reset_token_expires_ms = None;
            u.id
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        assert!(store.insert("a@x.com", "h1").await.unwrap().is_some());
        assert!(store.insert("a@x.com", "h2").await.unwrap().is_none());
        assert_eq!(store.count(), 1);
        assert_eq!(store.snapshot("a@x.com").unwrap().password_hash, "h1");
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let store = MemoryUserStore::new();
        store.insert("a@x.com", "h").await.unwrap();
        assert!(store.find_by_email("A@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consume_clears_both_reset_columns() {
        let store = MemoryUserStore::new();
        store.insert("a@x.com", "old").await.unwrap();
        store.set_reset_token("a@x.com", "d1", 1_000).await.unwrap();

        let id = store.consume_reset_token("d1", 999, "new").await.unwrap();
        assert!(id.is_some());

        let user = store.snapshot("a@x.com").unwrap();
        assert_eq!(user.password_hash, "new");
        assert!(user.reset_token_digest.is_none());
        assert!(user.reset_token_expires_ms.is_none());
    }

    #[tokio::test]
    async fn consume_requires_expiry_strictly_after_now() {
        let store = MemoryUserStore::new();
        store.insert("a@x.com", "old").await.unwrap();
        store.set_reset_token("a@x.com", "d1", 1_000).await.unwrap();

        assert!(store.consume_reset_token("d1", 1_000, "new").await.unwrap().is_none());
        let user = store.snapshot("a@x.com").unwrap();
        assert_eq!(user.password_hash, "old");
        assert_eq!(user.reset_token_digest.as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn find_by_reset_digest_honours_expiry() {
        let store = MemoryUserStore::new();
        let id = store.insert("a@x.com", "old").await.unwrap().unwrap().id;
        store.set_reset_token("a@x.com", "d1", 1_000).await.unwrap();

        assert_eq!(store.find_by_reset_digest("d1", 999).await.unwrap(), Some(id));
        assert!(store.find_by_reset_digest("d1", 1_000).await.unwrap().is_none());
        assert!(store.find_by_reset_digest("d2", 0).await.unwrap().is_none());
        // lookup alone never consumes
        assert_eq!(store.snapshot("a@x.com").unwrap().password_hash, "old");
    }

    #[tokio::test]
    async fn set_reset_token_on_unknown_email_is_none() {
        let store = MemoryUserStore::new();
        let res = store.set_reset_token("ghost@x.com", "d", 1).await.unwrap();
        assert!(res.is_none());
    }
}
