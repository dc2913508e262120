//! The Curator (§4.11 step 7): an optional, background-eligible hook that
//! updates long-lived memory after a reply is composed. It never blocks the
//! reply — the Router spawns it and moves on.

use async_trait::async_trait;
use locus_core::{Session, SessionKey};

#[async_trait]
pub trait Curator: Send + Sync {
    /// Inspects the just-completed turn and updates whatever long-lived
    /// memory store this deployment keeps, outside the session transcript
    /// itself. Errors are logged by the caller, never surfaced to the user
    /// who already received their reply.
    async fn update(&self, session_key: &SessionKey, session: &Session) -> Result<(), String>;
}

/// No-op default: curation is an optional capability, not every deployment
/// keeps a memory store worth updating.
pub struct NullCurator;

#[async_trait]
impl Curator for NullCurator {
    async fn update(&self, _session_key: &SessionKey, _session: &Session) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_core::{Session, SessionConfig};
    use std::path::PathBuf;

    #[tokio::test]
    async fn null_curator_is_always_ok() {
        let curator = NullCurator;
        let key = SessionKey::new("cli", "s1");
        let session = Session::new(key.clone(), PathBuf::from("/repo"), SessionConfig::new("m", "p"));
        assert!(curator.update(&key, &session).await.is_ok());
    }
}
