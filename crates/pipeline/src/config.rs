use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use synth_llm::LlmProvider;

/// Pipeline knobs, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub data_dir: PathBuf,
    /// Delay between successive external calls (chunk or per-atom bursts).
    pub throttle: Duration,
    /// Fixed wait between extraction attempts.
    pub backoff: Duration,
    pub max_attempts: u32,
    /// Input cap for the normalizer prompt.
    pub normalize_limit: usize,
    /// Above this, atomization goes through the chunking path.
    pub atomize_single_limit: usize,
    /// Harder truncation applied to atomizer retries.
    pub atomize_retry_limit: usize,
    pub chunk_size: usize,
    /// Cap on the serialized annotated-atoms payload for graph and theme
    /// prompts.
    pub graph_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: LlmProvider::Gemini.default_model().to_string(),
            data_dir: PathBuf::from("data"),
            throttle: Duration::from_millis(500),
            backoff: Duration::from_secs(1),
            max_attempts: 3,
            normalize_limit: 50_000,
            atomize_single_limit: 15_000,
            atomize_retry_limit: 10_000,
            chunk_size: 8_000,
            graph_limit: 15_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let provider_name = env::var("SYNTH_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = LlmProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!(format!("unknown provider {provider_name}")))?;
        let model =
            env::var("SYNTH_MODEL").unwrap_or_else(|_| provider.default_model().to_string());
        let data_dir = env::var("SYNTH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        Ok(Self {
            provider,
            model,
            data_dir,
            throttle: Duration::from_millis(
                env_usize("SYNTH_THROTTLE_MS", defaults.throttle.as_millis() as usize) as u64,
            ),
            backoff: Duration::from_millis(
                env_usize("SYNTH_BACKOFF_MS", defaults.backoff.as_millis() as usize) as u64,
            ),
            max_attempts: env_usize("SYNTH_MAX_ATTEMPTS", defaults.max_attempts as usize).max(1)
                as u32,
            normalize_limit: env_usize("SYNTH_NORMALIZE_LIMIT", defaults.normalize_limit),
            atomize_single_limit: env_usize(
                "SYNTH_ATOMIZE_SINGLE_LIMIT",
                defaults.atomize_single_limit,
            ),
            atomize_retry_limit: env_usize(
                "SYNTH_ATOMIZE_RETRY_LIMIT",
                defaults.atomize_retry_limit,
            ),
            chunk_size: env_usize("SYNTH_CHUNK_SIZE", defaults.chunk_size).max(1),
            graph_limit: env_usize("SYNTH_GRAPH_LIMIT", defaults.graph_limit),
        })
    }

    /// Quiet configuration for tests: no throttling, no backoff waits.
    pub fn unthrottled(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider: LlmProvider::Local,
            model: "local".to_string(),
            data_dir: data_dir.into(),
            throttle: Duration::ZERO,
            backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}

fn env_usize(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
