//! Per-user session records
//!
//! A session holds the single attribute the bot remembers about a user:
//! their name. Sessions live in process memory and reset on restart; the
//! [`SessionStore`] trait keeps the backend swappable.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Everything the bot knows about one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Name supplied by the user after /start
    pub name: String,
}

/// Keyed access to session records by Telegram user id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Session for `user_id`, if one was ever created
    async fn get(&self, user_id: i64) -> Option<Session>;
    /// Creates or overwrites the session for `user_id`
    async fn set(&self, user_id: i64, session: Session);
}

/// Process-memory session storage
#[derive(Default)]
pub struct InMemorySessions {
    inner: RwLock<HashMap<i64, Session>>,
}

impl InMemorySessions {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn get(&self, user_id: i64) -> Option<Session> {
        self.inner.read().await.get(&user_id).cloned()
    }

    async fn set(&self, user_id: i64, session: Session) {
        self.inner.write().await.insert(user_id, session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_user_has_no_session() {
        let store = InMemorySessions::new();
        assert_eq!(store.get(1).await, None);
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let store = InMemorySessions::new();
        store
            .set(
                1,
                Session {
                    name: "Maria".to_string(),
                },
            )
            .await;

        let session = store.get(1).await;
        assert_eq!(session.map(|s| s.name), Some("Maria".to_string()));
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_name() {
        let store = InMemorySessions::new();
        store
            .set(
                1,
                Session {
                    name: "Maria".to_string(),
                },
            )
            .await;
        store
            .set(
                1,
                Session {
                    name: "Ivan".to_string(),
                },
            )
            .await;

        let session = store.get(1).await;
        assert_eq!(session.map(|s| s.name), Some("Ivan".to_string()));
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let store = InMemorySessions::new();
        store
            .set(
                1,
                Session {
                    name: "Maria".to_string(),
                },
            )
            .await;

        assert_eq!(store.get(2).await, None);
    }
}
