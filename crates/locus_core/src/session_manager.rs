//! Session Manager (C9): get-or-create by key, append-only mutation,
//! idle reaping. Persistence is delegated to an external [`SessionStore`]
//! through a narrow Load/Save interface; the in-memory index here is what
//! enforces the append-only invariant and, via the `Arc<Mutex<Session>>` it
//! hands out, doubles as the per-session lock described in the Router's
//! design notes: at most one in-flight `Agent.Run` holds a session's mutex
//! at a time, and the map entry (and thus the lock) is reaped along with
//! the session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::error::{CoreError, Result};
use crate::session::{Session, SessionConfig, SessionKey};
use crate::turn::Turn;

/// External persistence for sessions. The Core never chooses a storage
/// format; it only calls through this interface.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &SessionKey) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
}

/// A store that persists nothing; `load` always misses, `save` is a no-op.
/// The default when no external store is configured.
pub struct NullSessionStore;

#[async_trait]
impl SessionStore for NullSessionStore {
    async fn load(&self, _key: &SessionKey) -> Result<Option<Session>> {
        Ok(None)
    }

    async fn save(&self, _session: &Session) -> Result<()> {
        Ok(())
    }
}

pub struct SessionManager {
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<Session>>>>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(NullSessionStore))
    }

    /// Returns the session's lock, creating and (if the store has a prior
    /// copy) restoring the session first. This is the handle a Router holds
    /// for the duration of one `Agent.Run` to guarantee per-session
    /// exclusivity.
    pub async fn get_or_create(
        &self,
        key: &SessionKey,
        repo_root: PathBuf,
        config: SessionConfig,
    ) -> Result<Arc<Mutex<Session>>> {
        if let Some(existing) = self.sessions.read().await.get(key) {
            return Ok(existing.clone());
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock: another task may have created it
        // between our read-lock release and acquiring the write lock.
        if let Some(existing) = sessions.get(key) {
            return Ok(existing.clone());
        }

        let session = match self.store.load(key).await? {
            Some(restored) => restored,
            None => Session::new(key.clone(), repo_root, config),
        };
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(key.clone(), handle.clone());
        Ok(handle)
    }

    /// Appends a turn to an existing session and persists the result.
    /// Fails with `NotFound` if the session was never created.
    pub async fn append(&self, key: &SessionKey, turn: Turn) -> Result<()> {
        let handle = self
            .sessions
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::not_found("session.append", key.to_string()))?;
        let mut session = handle.lock().await;
        session.add_turn(turn);
        self.store.save(&session).await
    }

    /// Removes the in-memory index entry for `key`. Any in-flight holder of
    /// the session's `Arc<Mutex<Session>>` retains a valid (if orphaned)
    /// reference until it finishes; a subsequent `get_or_create` allocates a
    /// fresh lock.
    pub async fn delete(&self, key: &SessionKey) -> Result<()> {
        self.sessions.write().await.remove(key);
        Ok(())
    }

    /// Removes every session idle longer than `older_than`, returning how
    /// many were reaped. Sessions currently held by an in-flight
    /// `Agent.Run` are skipped for this pass rather than awaited on, since
    /// reaping must never block behind live traffic.
    pub async fn reap_stale_sessions(&self, older_than: Duration) -> usize {
        let now = chrono::Utc::now();
        let candidates: Vec<SessionKey> = {
            let sessions = self.sessions.read().await;
            let mut keys = Vec::new();
            for (key, handle) in sessions.iter() {
                if let Ok(session) = handle.try_lock() {
                    if session.is_idle_since(older_than, now) {
                        keys.push(key.clone());
                    }
                }
            }
            keys
        };

        let mut reaped = 0;
        let mut sessions = self.sessions.write().await;
        for key in candidates {
            if sessions.remove(&key).is_some() {
                reaped += 1;
            }
        }
        reaped
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::ContentBlock;

    fn key(id: &str) -> SessionKey {
        SessionKey::new("cli", id)
    }

    fn config() -> SessionConfig {
        SessionConfig::new("claude-sonnet-4", "anthropic")
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_key() {
        let mgr = SessionManager::in_memory();
        let a = mgr
            .get_or_create(&key("s1"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        let b = mgr
            .get_or_create(&key("s1"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(mgr.session_count().await, 1);
    }

    #[tokio::test]
    async fn append_fails_not_found_before_create() {
        let mgr = SessionManager::in_memory();
        let err = mgr
            .append(&key("ghost"), Turn::user().with_block(ContentBlock::text("hi")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn append_is_monotone() {
        let mgr = SessionManager::in_memory();
        let handle = mgr
            .get_or_create(&key("s1"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        mgr.append(&key("s1"), Turn::user().with_block(ContentBlock::text("hi")))
            .await
            .unwrap();
        mgr.append(
            &key("s1"),
            Turn::assistant().with_block(ContentBlock::text("hello")),
        )
        .await
        .unwrap();
        let session = handle.lock().await;
        assert_eq!(session.turn_count(), 2);
    }

    #[tokio::test]
    async fn delete_removes_index_entry() {
        let mgr = SessionManager::in_memory();
        mgr.get_or_create(&key("s1"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        mgr.delete(&key("s1")).await.unwrap();
        assert_eq!(mgr.session_count().await, 0);
    }

    #[tokio::test]
    async fn reap_stale_sessions_removes_only_idle_ones() {
        let mgr = SessionManager::in_memory();
        let fresh = mgr
            .get_or_create(&key("fresh"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        let stale = mgr
            .get_or_create(&key("stale"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        // Force the stale session's last_activity into the past.
        {
            let mut s = stale.lock().await;
            s.last_activity = chrono::Utc::now() - Duration::hours(1);
        }
        let _ = fresh;

        let reaped = mgr.reap_stale_sessions(Duration::minutes(5)).await;
        assert_eq!(reaped, 1);
        assert_eq!(mgr.session_count().await, 1);
    }

    #[tokio::test]
    async fn reap_skips_sessions_currently_locked() {
        let mgr = SessionManager::in_memory();
        let handle = mgr
            .get_or_create(&key("busy"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        {
            let mut s = handle.lock().await;
            s.last_activity = chrono::Utc::now() - Duration::hours(1);
        }
        let guard = handle.lock().await;
        let reaped = mgr.reap_stale_sessions(Duration::minutes(5)).await;
        assert_eq!(reaped, 0, "a held lock must not be reaped out from under its holder");
        drop(guard);
    }

    #[tokio::test]
    async fn restores_from_store_on_first_access() {
        struct OneShotStore {
            key: SessionKey,
            session: tokio::sync::Mutex<Option<Session>>,
        }

        #[async_trait]
        impl SessionStore for OneShotStore {
            async fn load(&self, key: &SessionKey) -> Result<Option<Session>> {
                if *key == self.key {
                    Ok(self.session.lock().await.take())
                } else {
                    Ok(None)
                }
            }
            async fn save(&self, _session: &Session) -> Result<()> {
                Ok(())
            }
        }

        let mut restored = Session::new(key("restored"), PathBuf::from("/repo"), config());
        restored.add_turn(Turn::user().with_block(ContentBlock::text("earlier")));
        let store = Arc::new(OneShotStore {
            key: key("restored"),
            session: tokio::sync::Mutex::new(Some(restored)),
        });

        let mgr = SessionManager::new(store);
        let handle = mgr
            .get_or_create(&key("restored"), PathBuf::from("/repo"), config())
            .await
            .unwrap();
        assert_eq!(handle.lock().await.turn_count(), 1);
    }
}
