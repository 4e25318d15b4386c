use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A project identified by its sanitized slug. Sanitization is idempotent:
/// `ProjectRef::new(slug)` for an existing slug yields the same slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRef(String);

impl ProjectRef {
    pub fn new(raw: &str) -> Result<Self> {
        let slug = sanitize_slug(raw);
        if slug.is_empty() {
            return Err(PipelineError::InvalidProject(raw.to_string()));
        }
        Ok(Self(slug))
    }

    pub fn slug(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_dash = true;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// One step of the pipeline, doubling as the on-disk subdirectory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Uploads,
    Cleaned,
    Atoms,
    Annotated,
    Graphs,
    Boards,
    Qa,
    Quality,
}

impl Stage {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Uploads => "uploads",
            Stage::Cleaned => "cleaned",
            Stage::Atoms => "atoms",
            Stage::Annotated => "annotated",
            Stage::Graphs => "graphs",
            Stage::Boards => "boards",
            Stage::Qa => "qa",
            Stage::Quality => "quality",
        }
    }

    /// Extension for the stage artifact, applied after the source `.pdf`
    /// extension is stripped. Uploads keep the original filename.
    fn extension(&self) -> Option<&'static str> {
        match self {
            Stage::Uploads => None,
            Stage::Cleaned => Some("txt"),
            _ => Some("json"),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "uploads" => Some(Stage::Uploads),
            "cleaned" => Some(Stage::Cleaned),
            "atoms" => Some(Stage::Atoms),
            "annotated" => Some(Stage::Annotated),
            "graphs" => Some(Stage::Graphs),
            "boards" => Some(Stage::Boards),
            "qa" => Some(Stage::Qa),
            "quality" => Some(Stage::Quality),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Maps (project, stage, filename) to a deterministic artifact location,
/// creating intermediate directories on demand.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &ProjectRef) -> PathBuf {
        self.root.join(project.slug())
    }

    pub fn stage_dir(&self, project: &ProjectRef, stage: Stage) -> PathBuf {
        self.project_dir(project).join(stage.dir_name())
    }

    /// Resolve the artifact path for a source filename, stripping the `.pdf`
    /// extension and applying the stage-specific one. Creates intermediate
    /// directories.
    pub fn resolve(&self, project: &ProjectRef, stage: Stage, filename: &str) -> Result<PathBuf> {
        let path = self.locate(project, stage, filename)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| PipelineError::storage(dir, e))?;
        }
        Ok(path)
    }

    /// Same mapping as [`resolve`](Self::resolve) without touching the
    /// filesystem; used for existence checks.
    pub fn locate(&self, project: &ProjectRef, stage: Stage, filename: &str) -> Result<PathBuf> {
        let base = safe_base_name(filename)?;
        let dir = self.stage_dir(project, stage);
        let name = match stage.extension() {
            Some(ext) => format!("{base}.{ext}"),
            None => filename.to_string(),
        };
        Ok(dir.join(name))
    }

    /// Resolve a derived artifact that shares the cache directory of `stage`
    /// but carries a suffix, e.g. `demo_themes.json` under `graphs/`.
    pub fn resolve_derived(
        &self,
        project: &ProjectRef,
        stage: Stage,
        filename: &str,
        suffix: &str,
    ) -> Result<PathBuf> {
        let base = safe_base_name(filename)?;
        let dir = self.stage_dir(project, stage);
        fs::create_dir_all(&dir).map_err(|e| PipelineError::storage(&dir, e))?;
        Ok(dir.join(format!("{base}_{suffix}.json")))
    }

    /// Newest derived artifact for `filename` under `stage`, picked by
    /// lexicographic suffix order. UTC timestamp suffixes sort the same way
    /// they order chronologically, so this yields the most recent one.
    pub fn latest_derived(
        &self,
        project: &ProjectRef,
        stage: Stage,
        filename: &str,
    ) -> Result<Option<PathBuf>> {
        let base = safe_base_name(filename)?;
        let dir = self.stage_dir(project, stage);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PipelineError::storage(&dir, err)),
        };
        let prefix = format!("{base}_");
        let mut newest: Option<String> = None;
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::storage(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            if newest.as_deref().is_none_or(|seen| name.as_str() > seen) {
                newest = Some(name);
            }
        }
        Ok(newest.map(|name| dir.join(name)))
    }
}

fn safe_base_name(filename: &str) -> Result<String> {
    if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
        return Err(PipelineError::InvalidInput(format!(
            "unsafe filename: {filename:?}"
        )));
    }
    let lower = filename.to_lowercase();
    let base = if let Some(stripped) = lower.strip_suffix(".pdf") {
        &filename[..stripped.len()]
    } else {
        filename
    };
    if base.is_empty() {
        return Err(PipelineError::InvalidInput(format!(
            "filename {filename:?} has no base name"
        )));
    }
    Ok(base.to_string())
}
