//! The `Provider` capability interface and the LLM Registry (C2).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::ChatRequest;
use crate::types::ChatResponse;

/// A named LLM endpoint. Identity is by name ([`Provider::name`]), not by
/// wire protocol — the Core only ever depends on this trait.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// Map from provider-name to [`Provider`]. Read-mostly and safe under
/// concurrent readers; `register` is the only mutating path and fails
/// outright if the name is already bound, rather than silently overwriting
/// the prior registration.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under `id`. Fails with
    /// `Error::ProviderAlreadyRegistered` if the name is already bound,
    /// leaving the existing registration untouched.
    pub fn register(&mut self, id: impl Into<String>, provider: Arc<dyn Provider>) -> Result<()> {
        let id = id.into();
        if self.providers.contains_key(&id) {
            return Err(Error::ProviderAlreadyRegistered(id));
        }
        self.providers.insert(id, provider);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatResponse, Message, Usage};

    struct StubProvider {
        id: &'static str,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            self.id
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                message: Message::assistant("stub"),
                usage: Usage::default(),
                tool_calls: Vec::new(),
            })
        }
    }

    #[test]
    fn register_then_get_returns_same_provider() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("stub", Arc::new(StubProvider { id: "stub" }))
            .unwrap();
        let provider = registry.get("stub").unwrap();
        assert_eq!(provider.name(), "stub");
    }

    #[test]
    fn duplicate_register_fails_without_side_effect() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("stub", Arc::new(StubProvider { id: "stub" }))
            .unwrap();
        let err = registry
            .register("stub", Arc::new(StubProvider { id: "other" }))
            .unwrap_err();
        assert!(matches!(err, Error::ProviderAlreadyRegistered(_)));
        // the original registration must survive the failed overwrite attempt
        assert_eq!(registry.get("stub").unwrap().name(), "stub");
    }

    #[test]
    fn get_missing_provider_is_not_found() {
        let registry = ProviderRegistry::new();
        let err = registry.get("missing").err().unwrap();
        assert!(matches!(err, Error::ProviderNotFound(_)));
    }

    #[test]
    fn list_returns_all_registered_ids() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("alpha", Arc::new(StubProvider { id: "alpha" }))
            .unwrap();
        registry
            .register("beta", Arc::new(StubProvider { id: "beta" }))
            .unwrap();
        let mut ids = registry.list();
        ids.sort();
        assert_eq!(ids, vec!["alpha", "beta"]);
    }
}
