mod atomize;
mod config;
mod extract;
mod prompts;
mod stages;

pub use atomize::ChunkingAtomizer;
pub use config::PipelineConfig;
pub use extract::{truncate_with_marker, Extracted, RetryingExtractor, TruncationPolicy};
pub use stages::{CachedArtifact, FileStatus, Pipeline, ProjectStatus};
