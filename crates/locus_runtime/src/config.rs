//! Agent runtime configuration.
//!
//! Each module that needs its own tunables gets its own config struct
//! (`ContextGuardConfig`, `CompressorConfig`) rather than one flat bag —
//! mirrors how `locus_llms::CircuitBreakerConfig` and
//! `locus_toolbus::ProcessManagerConfig` are scoped to their own module.
//! Validation is eager: `build()` rejects an invalid configuration at
//! construction time rather than failing deep inside the agent loop.

use std::path::PathBuf;

use locus_core::SandboxPolicy;

use crate::error::{Result, RuntimeError};

/// Tunables for the Context Guard (C7): when to treat a session as
/// approaching its provider's context window.
#[derive(Debug, Clone)]
pub struct ContextGuardConfig {
    /// Provider context window, in tokens, this session is budgeted against.
    pub max_tokens: u64,
    /// Tokens reserved for the model's own response; never counted as
    /// available for conversation history.
    pub reserve_tokens: u64,
    /// Fraction of `max_tokens` (after reserving `reserve_tokens`) that
    /// triggers compression. Must be in `(0.0, 1.0]`.
    pub safety_margin: f32,
}

impl Default for ContextGuardConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200_000,
            reserve_tokens: 8_192,
            safety_margin: 0.85,
        }
    }
}

impl ContextGuardConfig {
    fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(RuntimeError::Config("context_guard.max_tokens must be non-zero".into()));
        }
        if self.reserve_tokens >= self.max_tokens {
            return Err(RuntimeError::Config(
                "context_guard.reserve_tokens must be smaller than max_tokens".into(),
            ));
        }
        if !(self.safety_margin > 0.0 && self.safety_margin <= 1.0) {
            return Err(RuntimeError::Config(
                "context_guard.safety_margin must be in (0.0, 1.0]".into(),
            ));
        }
        Ok(())
    }

    /// Token budget available for conversation history before the Guard
    /// calls for compression.
    pub fn threshold_tokens(&self) -> u64 {
        let usable = self.max_tokens.saturating_sub(self.reserve_tokens);
        (usable as f64 * self.safety_margin as f64) as u64
    }
}

/// Tunables for the Compressor (C8).
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Turns kept verbatim at the tail of the transcript after compression.
    pub keep_recent: usize,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self { keep_recent: 6 }
    }
}

impl CompressorConfig {
    fn validate(&self) -> Result<()> {
        if self.keep_recent == 0 {
            return Err(RuntimeError::Config("compressor.keep_recent must be non-zero".into()));
        }
        Ok(())
    }
}

/// Configuration for one [`crate::agent::Agent`].
///
/// Providers are identified by name (matching
/// [`locus_llms::ProviderRegistry`]'s `name`-keyed lookup) rather than a
/// closed enum, since the set of registered providers is a runtime
/// composition-root decision, not something this crate can enumerate ahead
/// of time.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub repo_root: PathBuf,
    pub model: String,
    pub provider: String,
    /// Hard ceiling on reasoning-loop iterations for one `Agent.Run`.
    /// Rejected at `build()` time if zero — a loop that can never iterate
    /// is never what the caller meant.
    pub max_iterations: u32,
    /// Maximum spawn fan-out for the `delegate` sub-agent tool.
    pub max_delegate_fan_out: u32,
    /// Maximum tokens requested per LLM response.
    pub max_tokens: u32,
    pub context_guard: ContextGuardConfig,
    pub compressor: CompressorConfig,
    pub sandbox: SandboxPolicy,
}

/// Builder for [`AgentConfig`]; `build()` performs eager validation.
#[derive(Debug, Clone)]
pub struct AgentConfigBuilder {
    repo_root: PathBuf,
    model: String,
    provider: String,
    max_iterations: u32,
    max_delegate_fan_out: u32,
    max_tokens: u32,
    context_guard: ContextGuardConfig,
    compressor: CompressorConfig,
    sandbox: SandboxPolicy,
}

impl AgentConfigBuilder {
    pub fn new(repo_root: PathBuf) -> Self {
        Self {
            repo_root,
            model: "claude-sonnet-4-20250514".to_string(),
            provider: "anthropic".to_string(),
            max_iterations: 50,
            max_delegate_fan_out: 4,
            max_tokens: 8192,
            context_guard: ContextGuardConfig::default(),
            compressor: CompressorConfig::default(),
            sandbox: SandboxPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_delegate_fan_out(mut self, max: u32) -> Self {
        self.max_delegate_fan_out = max;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_context_guard(mut self, guard: ContextGuardConfig) -> Self {
        self.context_guard = guard;
        self
    }

    pub fn with_compressor(mut self, compressor: CompressorConfig) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxPolicy) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn build(self) -> Result<AgentConfig> {
        if self.max_iterations == 0 {
            return Err(RuntimeError::Config("max_iterations must be non-zero".into()));
        }
        if self.max_delegate_fan_out == 0 {
            return Err(RuntimeError::Config("max_delegate_fan_out must be non-zero".into()));
        }
        if self.max_tokens == 0 {
            return Err(RuntimeError::Config("max_tokens must be non-zero".into()));
        }
        self.context_guard.validate()?;
        self.compressor.validate()?;

        Ok(AgentConfig {
            repo_root: self.repo_root,
            model: self.model,
            provider: self.provider,
            max_iterations: self.max_iterations,
            max_delegate_fan_out: self.max_delegate_fan_out,
            max_tokens: self.max_tokens,
            context_guard: self.context_guard,
            compressor: self.compressor,
            sandbox: self.sandbox,
        })
    }

    /// Builds from `LOCUS_*` environment variables layered on top of the
    /// defaults, validating eagerly exactly as [`Self::build`] does.
    pub fn from_env(repo_root: PathBuf) -> Result<AgentConfig> {
        let mut builder = Self::new(repo_root);

        if let Ok(model) = std::env::var("LOCUS_MODEL") {
            builder.model = model;
        }
        if let Ok(provider) = std::env::var("LOCUS_PROVIDER") {
            builder.provider = provider;
        }
        if let Ok(val) = std::env::var("LOCUS_MAX_ITERATIONS") {
            builder.max_iterations = val
                .parse()
                .map_err(|_| RuntimeError::Config("LOCUS_MAX_ITERATIONS must be a u32".into()))?;
        }
        if let Ok(val) = std::env::var("LOCUS_MAX_DELEGATE_FAN_OUT") {
            builder.max_delegate_fan_out = val
                .parse()
                .map_err(|_| RuntimeError::Config("LOCUS_MAX_DELEGATE_FAN_OUT must be a u32".into()))?;
        }
        if let Ok(val) = std::env::var("LOCUS_MAX_TOKENS") {
            builder.max_tokens = val
                .parse()
                .map_err(|_| RuntimeError::Config("LOCUS_MAX_TOKENS must be a u32".into()))?;
        }
        if let Ok(val) = std::env::var("LOCUS_CONTEXT_MAX_TOKENS") {
            builder.context_guard.max_tokens = val
                .parse()
                .map_err(|_| RuntimeError::Config("LOCUS_CONTEXT_MAX_TOKENS must be a u64".into()))?;
        }
        if let Ok(val) = std::env::var("LOCUS_COMPRESSOR_KEEP_RECENT") {
            builder.compressor.keep_recent = val
                .parse()
                .map_err(|_| RuntimeError::Config("LOCUS_COMPRESSOR_KEEP_RECENT must be a usize".into()))?;
        }

        builder.build()
    }
}
