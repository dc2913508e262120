//! The Router (C11): resolves an inbound message to a session and an agent,
//! runs it through the middleware pipeline, dispatches `Agent.Run` under the
//! session's exclusive lock, and composes the reply. See `crate` docs for
//! the full §4.11 contract this implements.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use locus_core::{EventBus, EventPayload, Role, SessionConfig, SessionKey, SessionManager};
use locus_runtime::Agent;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cluster::{ClusterCoordinator, NullClusterCoordinator};
use crate::curator::{Curator, NullCurator};
use crate::error::{Result, RouterError};
use crate::message::{InboundMessage, OutboundMessage};
use crate::middleware::{self, Middleware};
use crate::offline::{AlwaysOnline, OfflineManager, OfflineQueue};
use crate::strategy::AgentRouterStrategy;

/// How long one cluster-mode lock attempt is willing to hold the session
/// before another node may take over, if its holder never releases it.
const CLUSTER_LOCK_TTL: Duration = Duration::from_secs(30);

pub struct RouterBuilder {
    session_manager: Arc<SessionManager>,
    bus: Arc<EventBus>,
    repo_root: PathBuf,
    default_session_config: SessionConfig,
    agents: HashMap<String, Arc<Agent>>,
    strategy: AgentRouterStrategy,
    middleware: Vec<Arc<dyn Middleware>>,
    offline: Arc<dyn OfflineManager>,
    cluster: Arc<dyn ClusterCoordinator>,
    curator: Arc<dyn Curator>,
}

impl RouterBuilder {
    pub fn new(
        session_manager: Arc<SessionManager>,
        bus: Arc<EventBus>,
        repo_root: PathBuf,
        default_session_config: SessionConfig,
    ) -> Self {
        Self {
            session_manager,
            bus,
            repo_root,
            default_session_config,
            agents: HashMap::new(),
            strategy: AgentRouterStrategy::Default { default_agent_id: "default".to_string() },
            middleware: middleware::default_pipeline(),
            offline: Arc::new(AlwaysOnline),
            cluster: Arc::new(NullClusterCoordinator),
            curator: Arc::new(NullCurator),
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>, agent: Arc<Agent>) -> Self {
        self.agents.insert(agent_id.into(), agent);
        self
    }

    pub fn with_strategy(mut self, strategy: AgentRouterStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_offline_manager(mut self, offline: Arc<dyn OfflineManager>) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_cluster_coordinator(mut self, cluster: Arc<dyn ClusterCoordinator>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_curator(mut self, curator: Arc<dyn Curator>) -> Self {
        self.curator = curator;
        self
    }

    pub fn build(self) -> Router {
        Router {
            session_manager: self.session_manager,
            bus: self.bus,
            repo_root: self.repo_root,
            default_session_config: self.default_session_config,
            agents: self.agents,
            strategy: self.strategy,
            middleware: self.middleware,
            offline: self.offline,
            offline_queue: Arc::new(OfflineQueue::new()),
            cluster: self.cluster,
            curator: self.curator,
        }
    }
}

pub struct Router {
    session_manager: Arc<SessionManager>,
    bus: Arc<EventBus>,
    repo_root: PathBuf,
    default_session_config: SessionConfig,
    agents: HashMap<String, Arc<Agent>>,
    strategy: AgentRouterStrategy,
    middleware: Vec<Arc<dyn Middleware>>,
    offline: Arc<dyn OfflineManager>,
    offline_queue: Arc<OfflineQueue>,
    cluster: Arc<dyn ClusterCoordinator>,
    curator: Arc<dyn Curator>,
}

impl Router {
    /// Handles one inbound message end-to-end per §4.11's numbered steps.
    pub async fn handle(&self, inbound: InboundMessage, cancel: CancellationToken) -> Result<OutboundMessage> {
        let key = inbound.session_key.clone();

        if !self.cluster.try_lock(&key, CLUSTER_LOCK_TTL).await {
            return Err(RouterError::ClusterLockContended);
        }
        let result = self.handle_locked(inbound, cancel).await;
        self.cluster.unlock(&key).await;
        result
    }

    async fn handle_locked(
        &self,
        inbound: InboundMessage,
        cancel: CancellationToken,
    ) -> Result<OutboundMessage> {
        let key = inbound.session_key.clone();

        let session_handle = self
            .session_manager
            .get_or_create(&key, self.repo_root.clone(), self.default_session_config.clone())
            .await?;
        // Holding this guard across the whole handler is the per-session
        // exclusive lock §5 requires: at most one in-flight `Agent.Run` per
        // session, enforced by `SessionManager` itself rather than a second
        // lock map here.
        let mut session = session_handle.lock().await;

        let filtered = match middleware::run_pipeline(&self.middleware, &inbound).await {
            Ok(message) => message,
            Err((stage, reason)) => {
                warn!("inbound message blocked for session {key}: {stage} rejected it: {reason}");
                self.bus
                    .publish(EventPayload::RouterError { session_key: key.clone(), reason: reason.clone() })
                    .await;
                return Ok(OutboundMessage::error(format!("blocked by {stage}: {reason}")));
            }
        };

        let group_id = filtered.metadata.get("group_id").and_then(|v| v.as_str());
        let resolution = match &session.metadata.agent_id_override {
            Some(agent_id) => crate::strategy::Resolution { agent_id: agent_id.clone(), text: filtered.text },
            None => self.strategy.resolve(&key.channel, group_id, &filtered.text),
        };

        let (agent_id, offline_sourced) = if self.offline.is_network_unreachable() {
            match self.offline.local_agent_id() {
                Some(local_agent_id) => (local_agent_id, true),
                None => {
                    self.offline_queue.enqueue(inbound).await;
                    return Ok(OutboundMessage::offline(
                        "currently offline; your message has been queued and will be handled once \
                         connectivity is restored",
                    ));
                }
            }
        } else {
            (resolution.agent_id, false)
        };

        let agent = self.agents.get(&agent_id).cloned().ok_or_else(|| RouterError::UnknownAgent(agent_id))?;

        agent.run(&mut *session, resolution.text, cancel).await?;

        let reply_text = session
            .turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.text())
            .unwrap_or_default();

        if offline_sourced {
            info!("reply for session {key} served from an offline-local agent");
        }

        let curator = self.curator.clone();
        let curator_key = key.clone();
        let curator_session = session.clone();
        tokio::spawn(async move {
            if let Err(reason) = curator.update(&curator_key, &curator_session).await {
                warn!("curator update failed for session {curator_key}: {reason}");
            }
        });

        let outbound = if offline_sourced {
            OutboundMessage::offline(reply_text)
        } else {
            OutboundMessage::reply(reply_text)
        };
        Ok(outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_llms::{ChatRequest, ChatResponse, Error as LlmError, Message, Provider, Usage};
    use locus_toolbus::ToolRegistry;
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, LlmError> {
            let last_user_text = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == locus_llms::Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse {
                message: Message::assistant(format!("echo: {last_user_text}")),
                usage: Usage { input_tokens: 1, output_tokens: 1 },
                tool_calls: vec![],
            })
        }
    }

    fn make_agent() -> Arc<Agent> {
        let config = locus_runtime::AgentConfigBuilder::new(PathBuf::from("/repo")).build().unwrap();
        let provider: Arc<dyn Provider> = Arc::new(EchoProvider);
        let tools = Arc::new(ToolRegistry::new());
        let bus = Arc::new(EventBus::new());
        Arc::new(Agent::new(config, provider, tools, bus))
    }

    fn build_router() -> Router {
        let session_manager = Arc::new(SessionManager::in_memory());
        let bus = Arc::new(EventBus::new());
        RouterBuilder::new(
            session_manager,
            bus,
            PathBuf::from("/repo"),
            SessionConfig::new("test-model", "echo"),
        )
        .with_agent("default", make_agent())
        .build()
    }

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage::new(SessionKey::new("cli", "s1"), "alice", text)
    }

    #[tokio::test]
    async fn handle_dispatches_to_default_agent_and_composes_reply() {
        let router = build_router();
        let reply = router.handle(inbound("hello"), CancellationToken::new()).await.unwrap();
        assert!(!reply.is_error);
        assert_eq!(reply.text, "echo: hello");
    }

    #[tokio::test]
    async fn handle_blocks_opted_out_sender_before_dispatch() {
        let router = build_router();
        let message = inbound("hello").with_metadata(serde_json::json!({"privacy": {"opt_out": true}}));
        let reply = router.handle(message, CancellationToken::new()).await.unwrap();
        assert!(reply.is_error);
        assert!(reply.text.contains("privacy_filter"));
    }

    #[tokio::test]
    async fn handle_rejects_unknown_agent_from_prefix() {
        let session_manager = Arc::new(SessionManager::in_memory());
        let bus = Arc::new(EventBus::new());
        let router = RouterBuilder::new(
            session_manager,
            bus,
            PathBuf::from("/repo"),
            SessionConfig::new("test-model", "echo"),
        )
        .with_agent("default", make_agent())
        .with_strategy(AgentRouterStrategy::Prefix {
            default_agent_id: "ghost".to_string(),
            agents: HashMap::new(),
        })
        .build();

        let err = router.handle(inbound("hi"), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RouterError::UnknownAgent(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn handle_honors_session_agent_override() {
        let router = build_router();
        let key = SessionKey::new("cli", "s1");
        let handle = router
            .session_manager
            .get_or_create(&key, PathBuf::from("/repo"), SessionConfig::new("test-model", "echo"))
            .await
            .unwrap();
        handle.lock().await.metadata.agent_id_override = Some("default".to_string());

        let reply = router.handle(inbound("hi"), CancellationToken::new()).await.unwrap();
        assert!(!reply.is_error);
    }

    #[tokio::test]
    async fn handle_queues_offline_message_with_no_local_provider() {
        struct Offline;
        impl OfflineManager for Offline {
            fn is_network_unreachable(&self) -> bool {
                true
            }
            fn local_agent_id(&self) -> Option<String> {
                None
            }
        }

        let session_manager = Arc::new(SessionManager::in_memory());
        let bus = Arc::new(EventBus::new());
        let router = RouterBuilder::new(
            session_manager,
            bus,
            PathBuf::from("/repo"),
            SessionConfig::new("test-model", "echo"),
        )
        .with_agent("default", make_agent())
        .with_offline_manager(Arc::new(Offline))
        .build();

        let reply = router.handle(inbound("hi"), CancellationToken::new()).await.unwrap();
        assert!(reply.offline_sourced);
        assert!(reply.text.contains("queued"));
        assert_eq!(router.offline_queue.pending_count(&SessionKey::new("cli", "s1")).await, 1);
    }

    #[tokio::test]
    async fn handle_substitutes_local_agent_when_offline() {
        struct OfflineWithLocal;
        impl OfflineManager for OfflineWithLocal {
            fn is_network_unreachable(&self) -> bool {
                true
            }
            fn local_agent_id(&self) -> Option<String> {
                Some("local".to_string())
            }
        }

        let session_manager = Arc::new(SessionManager::in_memory());
        let bus = Arc::new(EventBus::new());
        let router = RouterBuilder::new(
            session_manager,
            bus,
            PathBuf::from("/repo"),
            SessionConfig::new("test-model", "echo"),
        )
        .with_agent("local", make_agent())
        .with_offline_manager(Arc::new(OfflineWithLocal))
        .build();

        let reply = router.handle(inbound("hi"), CancellationToken::new()).await.unwrap();
        assert!(reply.offline_sourced);
        assert_eq!(reply.text, "echo: hi");
    }
}
