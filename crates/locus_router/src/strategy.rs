//! Agent resolution strategy (§4.11 step 5): which agent id a message routes
//! to, given the channel it arrived on and its text.

use std::collections::HashMap;

/// One `Config`-strategy rule: match an inbound channel (and, optionally, a
/// group id carried in its metadata) to an agent id. Rules are tried in
/// order; the first match wins.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub channel: String,
    pub group_id: Option<String>,
    pub agent_id: String,
}

impl RoutingRule {
    pub fn new(channel: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self { channel: channel.into(), group_id: None, agent_id: agent_id.into() }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    fn matches(&self, channel: &str, group_id: Option<&str>) -> bool {
        self.channel == channel && self.group_id.as_deref() == group_id
    }
}

#[derive(Debug, Clone)]
pub enum AgentRouterStrategy {
    /// Always resolves to the configured default agent.
    Default { default_agent_id: String },
    /// `@name ...` addresses a named agent (case-insensitive); anything
    /// else falls back to the default.
    Prefix {
        default_agent_id: String,
        agents: HashMap<String, String>,
    },
    /// Matches (channel, optional group id) against `rules` in order;
    /// falls back to the default if nothing matches.
    Config {
        rules: Vec<RoutingRule>,
        default_agent_id: String,
    },
}

/// Outcome of resolving an inbound message to an agent: the agent id to
/// dispatch to, and the message text with any routing prefix stripped.
pub struct Resolution {
    pub agent_id: String,
    pub text: String,
}

impl AgentRouterStrategy {
    pub fn resolve(&self, channel: &str, group_id: Option<&str>, text: &str) -> Resolution {
        match self {
            AgentRouterStrategy::Default { default_agent_id } => {
                Resolution { agent_id: default_agent_id.clone(), text: text.to_string() }
            }
            AgentRouterStrategy::Prefix { default_agent_id, agents } => {
                if let Some(rest) = text.strip_prefix('@') {
                    let (name, remainder) = match rest.split_once(char::is_whitespace) {
                        Some((name, remainder)) => (name, remainder.trim_start()),
                        None => (rest, ""),
                    };
                    let lookup = name.to_lowercase();
                    if let Some(agent_id) = agents.get(&lookup) {
                        return Resolution { agent_id: agent_id.clone(), text: remainder.to_string() };
                    }
                }
                Resolution { agent_id: default_agent_id.clone(), text: text.to_string() }
            }
            AgentRouterStrategy::Config { rules, default_agent_id } => {
                let agent_id = rules
                    .iter()
                    .find(|rule| rule.matches(channel, group_id))
                    .map(|rule| rule.agent_id.clone())
                    .unwrap_or_else(|| default_agent_id.clone());
                Resolution { agent_id, text: text.to_string() }
            }
        }
    }
}
