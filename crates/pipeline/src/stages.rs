//! Stage orchestration: upload → normalize → atomize → annotate → graph, plus
//! the theme-clustering, graph-enhancement, and quality-guard side paths.
//!
//! Every derived stage is cache-first against the permanent on-disk artifact
//! store and refuses to run when its input stage is missing, naming the
//! missing stage in the error. Extraction stages degrade to deterministic
//! fallbacks instead of failing; only storage and PDF problems surface as
//! errors.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use synth_core::{
    extract_pdf_text, repair, repair_theme_coverage, run_quality_guard, AnnotatedAtom, Annotation,
    Atom, EdgeKind, GraphArtifact, GraphEdge, GraphNode, Insight, InsightType, NodeStyle,
    PathResolver, PipelineError, ProjectRef, QualityReport, Result, Stage, StageCache, Theme,
};
use synth_llm::TextTransformer;

use crate::atomize::ChunkingAtomizer;
use crate::config::PipelineConfig;
use crate::extract::{RetryingExtractor, TruncationPolicy};
use crate::prompts;

const NORMALIZE_ATTEMPTS: u32 = 2;
const MIN_CLEANED_LEN: usize = 10;
const NORMALIZE_FALLBACK_PREFIX: &str = "[Normalization failed - returning raw text]\n\n";

/// Per-file completion flags reported by [`Pipeline::list_projects`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatus {
    pub filename: String,
    pub cleaned: bool,
    pub atoms: bool,
    pub annotated: bool,
    pub graph: bool,
    pub themes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project: String,
    pub files: Vec<FileStatus>,
}

/// A cached artifact fetched by (project, stage, filename).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CachedArtifact {
    Text(String),
    Json(Value),
}

pub struct Pipeline {
    config: PipelineConfig,
    paths: PathResolver,
    cache: StageCache,
    transformer: Arc<dyn TextTransformer>,
    atomizer: ChunkingAtomizer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, transformer: Arc<dyn TextTransformer>) -> Self {
        let paths = PathResolver::new(config.data_dir.clone());
        let atomizer = ChunkingAtomizer::new(&config);
        Self {
            config,
            paths,
            cache: StageCache::new(),
            transformer,
            atomizer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn extractor(&self, attempts: u32) -> RetryingExtractor {
        RetryingExtractor::new(Arc::clone(&self.transformer), attempts, self.config.backoff)
    }

    fn project(&self, project: &str) -> Result<ProjectRef> {
        ProjectRef::new(project)
    }

    /// A prior stage's artifact must exist before the next stage may run.
    fn require(&self, project: &ProjectRef, stage: Stage, filename: &str) -> Result<PathBuf> {
        let path = self.paths.locate(project, stage, filename)?;
        if !self.cache.exists(&path) {
            return Err(PipelineError::precondition(stage, filename));
        }
        Ok(path)
    }

    // ---- ingest ----

    pub fn upload(&self, project: &str, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let project = self.project(project)?;
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(PipelineError::InvalidInput(format!(
                "only PDF uploads are accepted, got {filename:?}"
            )));
        }
        if bytes.is_empty() {
            return Err(PipelineError::InvalidInput("empty upload".to_string()));
        }
        let path = self.paths.resolve(&project, Stage::Uploads, filename)?;
        self.cache.write_bytes(&path, bytes)?;
        tracing::info!(project = project.slug(), filename, size = bytes.len(), "stored upload");
        Ok(path)
    }

    // ---- core stages ----

    pub fn normalize(&self, project: &str, filename: &str) -> Result<String> {
        let project = self.project(project)?;
        let upload = self.require(&project, Stage::Uploads, filename)?;
        let target = self.paths.resolve(&project, Stage::Cleaned, filename)?;
        self.cache.get_or_compute_text(&target, || {
            let raw = extract_pdf_text(&upload)?;
            Ok(normalize_text(
                &self.extractor(NORMALIZE_ATTEMPTS),
                self.config.normalize_limit,
                &raw,
            ))
        })
    }

    pub fn atomize(&self, project: &str, filename: &str) -> Result<Vec<Atom>> {
        let project = self.project(project)?;
        let cleaned_path = self.require(&project, Stage::Cleaned, filename)?;
        let target = self.paths.resolve(&project, Stage::Atoms, filename)?;
        self.cache.get_or_compute_json(&target, || {
            let cleaned = self
                .cache
                .read_text_opt(&cleaned_path)?
                .ok_or_else(|| PipelineError::precondition(Stage::Cleaned, filename))?;
            let extractor = self.extractor(self.config.max_attempts);
            Ok(self.atomizer.atomize(&extractor, &cleaned, filename))
        })
    }

    /// Annotate stored atoms, or the caller-supplied ones when re-annotating
    /// edited evidence. A per-atom failure yields an empty annotation for
    /// that atom only.
    pub fn annotate(
        &self,
        project: &str,
        filename: &str,
        atoms: Option<Vec<Atom>>,
    ) -> Result<Vec<AnnotatedAtom>> {
        let project = self.project(project)?;
        let atoms = match atoms {
            Some(atoms) => atoms,
            None => {
                let path = self.require(&project, Stage::Atoms, filename)?;
                self.cache
                    .read_json_opt(&path)?
                    .ok_or_else(|| PipelineError::precondition(Stage::Atoms, filename))?
            }
        };
        let target = self.paths.resolve(&project, Stage::Annotated, filename)?;
        self.cache
            .get_or_compute_json(&target, || Ok(self.annotate_atoms(atoms)))
    }

    fn annotate_atoms(&self, atoms: Vec<Atom>) -> Vec<AnnotatedAtom> {
        let extractor = self.extractor(self.config.max_attempts);
        let total = atoms.len();
        let mut annotated = Vec::with_capacity(total);
        for (i, atom) in atoms.into_iter().enumerate() {
            let annotation = extractor.extract(
                &atom.text,
                TruncationPolicy::fixed(self.config.atomize_single_limit),
                prompts::annotator,
                |raw| {
                    let value: Value = serde_json::from_str(&repair(raw)).ok()?;
                    Annotation::from_value(&value)
                },
                |_| Annotation::default(),
            );
            if annotation.degraded {
                tracing::warn!(atom = %atom.id, "annotator degraded to empty annotation");
            }
            annotated.push(AnnotatedAtom::new(atom, annotation.value));
            if i + 1 < total && !self.config.throttle.is_zero() {
                thread::sleep(self.config.throttle);
            }
        }
        annotated
    }

    pub fn graph(&self, project: &str, filename: &str) -> Result<GraphArtifact> {
        let project = self.project(project)?;
        let annotated = self.load_annotated(&project, filename)?;
        let target = self.paths.resolve(&project, Stage::Graphs, filename)?;
        self.cache
            .get_or_compute_json(&target, || Ok(self.build_graph(&annotated)))
    }

    fn build_graph(&self, annotated: &[AnnotatedAtom]) -> GraphArtifact {
        let atoms_json = serde_json::to_string(annotated).unwrap_or_default();
        let out = self.extractor(self.config.max_attempts).extract(
            &atoms_json,
            TruncationPolicy::fixed(self.config.graph_limit),
            prompts::graph_builder,
            |raw| serde_json::from_str::<GraphArtifact>(&repair(raw)).ok(),
            |_| fallback_graph(annotated),
        );
        if out.degraded {
            tracing::warn!(attempts = out.attempts, "graph builder degraded to shared-insight graph");
        }
        let mut graph = out.value;
        // Nodes always come from our own annotated atoms; the model only
        // contributes relationships.
        graph.nodes = annotated.iter().map(GraphNode::from).collect();
        graph.prune_dangling();
        let ids: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        repair_theme_coverage(&mut graph.themes, &ids);
        graph
    }

    // ---- side paths ----

    pub fn themes(&self, project: &str, filename: &str) -> Result<Vec<Theme>> {
        let project = self.project(project)?;
        let annotated = self.load_annotated(&project, filename)?;
        let target = self
            .paths
            .resolve_derived(&project, Stage::Graphs, filename, "themes")?;
        self.cache
            .get_or_compute_json(&target, || Ok(self.cluster_themes(&annotated)))
    }

    fn cluster_themes(&self, annotated: &[AnnotatedAtom]) -> Vec<Theme> {
        let atoms_json = serde_json::to_string(annotated).unwrap_or_default();
        let out = self.extractor(self.config.max_attempts).extract(
            &atoms_json,
            TruncationPolicy::fixed(self.config.graph_limit),
            prompts::theme_clustering,
            |raw| serde_json::from_str::<Vec<Theme>>(&repair(raw)).ok(),
            |_| fallback_themes(annotated),
        );
        if out.degraded {
            tracing::warn!(attempts = out.attempts, "theme clustering degraded to dominant-insight grouping");
        }
        let mut themes = out.value;
        let ids: Vec<String> = annotated.iter().map(|a| a.atom.id.clone()).collect();
        repair_theme_coverage(&mut themes, &ids);
        themes
    }

    pub fn enhance_graph(&self, project: &str, filename: &str) -> Result<Vec<NodeStyle>> {
        let project = self.project(project)?;
        let graph_path = self.require(&project, Stage::Graphs, filename)?;
        let graph: GraphArtifact = self
            .cache
            .read_json_opt(&graph_path)?
            .ok_or_else(|| PipelineError::precondition(Stage::Graphs, filename))?;
        let target = self
            .paths
            .resolve_derived(&project, Stage::Graphs, filename, "styles")?;
        self.cache
            .get_or_compute_json(&target, || Ok(self.style_nodes(&graph.nodes)))
    }

    fn style_nodes(&self, nodes: &[GraphNode]) -> Vec<NodeStyle> {
        let nodes_json = serde_json::to_string(nodes).unwrap_or_default();
        let out = self.extractor(self.config.max_attempts).extract(
            &nodes_json,
            TruncationPolicy::fixed(self.config.graph_limit),
            prompts::enhance_graph,
            |raw| {
                let styles: Vec<NodeStyle> = serde_json::from_str(&repair(raw)).ok()?;
                if styles.is_empty() {
                    None
                } else {
                    Some(styles)
                }
            },
            |_| nodes.iter().map(fallback_style).collect(),
        );
        if out.degraded {
            tracing::warn!(attempts = out.attempts, "graph enhancement degraded to static styling");
        }
        out.value
    }

    /// Always recomputed; the persisted report is an audit trail, not a
    /// cache.
    pub fn quality_guard(&self, project: &str, filename: &str) -> Result<QualityReport> {
        let project = self.project(project)?;
        let annotated = self.load_annotated(&project, filename)?;
        let themes = self.load_themes(&project, filename)?;
        let board = self.load_board(&project, filename)?;
        let report = run_quality_guard(project.slug(), &themes, &annotated, board.as_ref());
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let path = self
            .paths
            .resolve_derived(&project, Stage::Quality, filename, &stamp)?;
        self.cache.write_json(&path, &report)?;
        tracing::info!(
            project = project.slug(),
            filename,
            status = ?report.status,
            score = report.overall_score,
            "quality report persisted"
        );
        Ok(report)
    }

    // ---- project surface ----

    pub fn list_projects(&self) -> Result<Vec<ProjectStatus>> {
        let root = self.paths.root();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(PipelineError::storage(root, err)),
        };
        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::storage(root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(project) = ProjectRef::new(&name) else {
                continue;
            };
            projects.push(ProjectStatus {
                files: self.file_statuses(&project)?,
                project: name,
            });
        }
        projects.sort_by(|a, b| a.project.cmp(&b.project));
        Ok(projects)
    }

    fn file_statuses(&self, project: &ProjectRef) -> Result<Vec<FileStatus>> {
        let uploads = self.paths.stage_dir(project, Stage::Uploads);
        let entries = match fs::read_dir(&uploads) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(PipelineError::storage(&uploads, err)),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::storage(&uploads, e))?;
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.to_lowercase().ends_with(".pdf") {
                continue;
            }
            let done = |stage| {
                self.paths
                    .locate(project, stage, &filename)
                    .map(|p| self.cache.exists(&p))
                    .unwrap_or(false)
            };
            let themes = self
                .paths
                .resolve_derived(project, Stage::Graphs, &filename, "themes")
                .map(|p| self.cache.exists(&p))
                .unwrap_or(false);
            files.push(FileStatus {
                cleaned: done(Stage::Cleaned),
                atoms: done(Stage::Atoms),
                annotated: done(Stage::Annotated),
                graph: done(Stage::Graphs),
                themes,
                filename,
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    pub fn cached(
        &self,
        project: &str,
        stage: &str,
        filename: &str,
    ) -> Result<Option<CachedArtifact>> {
        let project = self.project(project)?;
        let stage = Stage::from_name(stage)
            .ok_or_else(|| PipelineError::InvalidInput(format!("unknown stage {stage:?}")))?;
        if stage == Stage::Uploads {
            return Err(PipelineError::InvalidInput(
                "raw uploads are not served as artifacts".to_string(),
            ));
        }
        // Quality reports carry timestamp suffixes, so the lookup resolves
        // the newest one instead of a fixed path.
        let path = if stage == Stage::Quality {
            match self.paths.latest_derived(&project, stage, filename)? {
                Some(path) => path,
                None => return Ok(None),
            }
        } else {
            self.paths.locate(&project, stage, filename)?
        };
        if stage == Stage::Cleaned {
            Ok(self.cache.read_text_opt(&path)?.map(CachedArtifact::Text))
        } else {
            Ok(self.cache.read_json_opt(&path)?.map(CachedArtifact::Json))
        }
    }

    pub fn delete_project(&self, project: &str) -> Result<()> {
        let project = self.project(project)?;
        let dir = self.paths.project_dir(&project);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(project = project.slug(), "project deleted");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PipelineError::storage(&dir, err)),
        }
    }

    // ---- loaders ----

    fn load_annotated(&self, project: &ProjectRef, filename: &str) -> Result<Vec<AnnotatedAtom>> {
        let path = self.require(project, Stage::Annotated, filename)?;
        self.cache
            .read_json_opt(&path)?
            .ok_or_else(|| PipelineError::precondition(Stage::Annotated, filename))
    }

    fn load_themes(&self, project: &ProjectRef, filename: &str) -> Result<Vec<Theme>> {
        let derived = self
            .paths
            .resolve_derived(project, Stage::Graphs, filename, "themes")?;
        if let Some(themes) = self.cache.read_json_opt(&derived)? {
            return Ok(themes);
        }
        let graph_path = self.require(project, Stage::Graphs, filename)?;
        let graph: GraphArtifact = self
            .cache
            .read_json_opt(&graph_path)?
            .ok_or_else(|| PipelineError::precondition(Stage::Graphs, filename))?;
        Ok(graph.themes)
    }

    fn load_board(&self, project: &ProjectRef, filename: &str) -> Result<Option<Value>> {
        let path = self.paths.locate(project, Stage::Boards, filename)?;
        self.cache.read_json_opt(&path)
    }
}

/// Clean a raw transcript through the model. A reply shorter than
/// [`MIN_CLEANED_LEN`] after trimming counts as a failed attempt; once the
/// attempts run out the raw text is returned behind a visible failure marker
/// rather than losing the transcript.
fn normalize_text(extractor: &RetryingExtractor, limit: usize, raw: &str) -> String {
    let out = extractor.extract(
        raw,
        TruncationPolicy::fixed(limit),
        prompts::normalizer,
        |resp| {
            let cleaned = resp.trim();
            if cleaned.len() < MIN_CLEANED_LEN {
                None
            } else {
                Some(cleaned.to_string())
            }
        },
        |_| format!("{NORMALIZE_FALLBACK_PREFIX}{raw}"),
    );
    if out.degraded {
        tracing::warn!(attempts = out.attempts, "normalizer degraded to raw text");
    }
    out.value
}

/// Deterministic graph built when the model never produces a usable one:
/// edges connect atoms that share an insight label, weighted by the weaker
/// of the two matching insights.
fn fallback_graph(annotated: &[AnnotatedAtom]) -> GraphArtifact {
    let mut edges = Vec::new();
    for (i, a) in annotated.iter().enumerate() {
        for b in &annotated[i + 1..] {
            for (kind, label) in a.shared_insights(b) {
                let weight = insight_weight(a, kind, &label)
                    .min(insight_weight(b, kind, &label));
                edges.push(GraphEdge {
                    source: a.atom.id.clone(),
                    target: b.atom.id.clone(),
                    label,
                    weight,
                    kind: EdgeKind::SharedLabel,
                });
            }
        }
    }
    GraphArtifact {
        nodes: annotated.iter().map(GraphNode::from).collect(),
        edges,
        ..GraphArtifact::default()
    }
}

fn insight_weight(atom: &AnnotatedAtom, kind: InsightType, label: &str) -> f32 {
    atom.insights
        .iter()
        .find(|i| i.kind == kind && i.label == label)
        .map(|i| i.weight)
        .unwrap_or(0.0)
}

fn dominant_insight(atom: &AnnotatedAtom) -> Option<&Insight> {
    atom.insights.iter().max_by(|a, b| {
        a.weight
            .partial_cmp(&b.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Groups atoms by their dominant insight label. Atoms with no insights are
/// left out and land in the "unthemed" bucket during coverage repair.
fn fallback_themes(annotated: &[AnnotatedAtom]) -> Vec<Theme> {
    let mut by_label: std::collections::BTreeMap<String, Theme> = Default::default();
    for atom in annotated {
        let Some(insight) = dominant_insight(atom) else {
            continue;
        };
        let theme = by_label
            .entry(insight.label.clone())
            .or_insert_with(|| Theme {
                name: insight.label.clone(),
                summary: format!("Atoms sharing the dominant insight \"{}\".", insight.label),
                dominant_insights: [(insight.kind.as_str().to_string(), insight.label.clone())]
                    .into_iter()
                    .collect(),
                ..Theme::default()
            });
        theme.atom_ids.push(atom.atom.id.clone());
    }
    by_label.into_values().collect()
}

fn fallback_style(node: &GraphNode) -> NodeStyle {
    let (color, icon, category) = match dominant_kind(node) {
        Some(InsightType::Pain) | Some(InsightType::Severity) => ("#ff4757", "😤", "pain"),
        Some(InsightType::Emotion) => ("#a55eea", "💬", "emotion"),
        Some(InsightType::RootCause) | Some(InsightType::Device) | Some(InsightType::Channel) => {
            ("#1e90ff", "🔧", "technical")
        }
        Some(InsightType::Impact) => ("#ffa502", "⚖️", "comparison"),
        Some(InsightType::Persona) | Some(InsightType::Context) | Some(InsightType::Frequency) => {
            ("#2ed573", "🧭", "behavior")
        }
        None => ("#a4b0be", "📝", "other"),
    };
    let label = node
        .insights
        .first()
        .map(|i| i.label.clone())
        .or_else(|| node.tags.first().cloned())
        .unwrap_or_else(|| "note".to_string());
    NodeStyle {
        id: node.id.clone(),
        color: color.to_string(),
        icon: icon.to_string(),
        label,
        category: category.to_string(),
    }
}

fn dominant_kind(node: &GraphNode) -> Option<InsightType> {
    node.insights
        .iter()
        .max_by(|a, b| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|i| i.kind)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use synth_llm::{LlmRequest, LlmResponse};

    use super::*;

    struct FixedReply {
        calls: AtomicU32,
        reply: &'static str,
    }

    impl FixedReply {
        fn new(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                reply,
            })
        }
    }

    impl TextTransformer for FixedReply {
        fn transform(&self, _req: &LlmRequest) -> anyhow::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LlmResponse::text(self.reply))
        }
    }

    fn extractor(stub: &Arc<FixedReply>) -> RetryingExtractor {
        RetryingExtractor::new(
            Arc::clone(stub) as Arc<dyn TextTransformer>,
            NORMALIZE_ATTEMPTS,
            Duration::ZERO,
        )
    }

    #[test]
    fn normalize_returns_trimmed_model_reply() {
        let stub = FixedReply::new("  P1: cleaned transcript body  ");
        let cleaned = normalize_text(&extractor(&stub), 50_000, "raw transcript");
        assert_eq!(cleaned, "P1: cleaned transcript body");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn normalize_exhausts_attempts_then_falls_back_to_raw() {
        let stub = FixedReply::new("ok!");
        let raw = "P1: the raw transcript we must not lose";
        let cleaned = normalize_text(&extractor(&stub), 50_000, raw);
        assert_eq!(cleaned, format!("{NORMALIZE_FALLBACK_PREFIX}{raw}"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), NORMALIZE_ATTEMPTS);
    }

    fn annotated(id: &str, kind: InsightType, label: &str, weight: f32) -> AnnotatedAtom {
        AnnotatedAtom {
            atom: Atom {
                id: id.to_string(),
                speaker: "P1".to_string(),
                text: format!("quote {id}"),
                context: String::new(),
                entities: Default::default(),
                confidence: Default::default(),
                source_file: "t.pdf".to_string(),
            },
            insights: vec![Insight {
                kind,
                label: label.to_string(),
                weight,
            }],
            tags: Vec::new(),
        }
    }

    #[test]
    fn fallback_graph_links_shared_labels() {
        let atoms = vec![
            annotated("a", InsightType::Pain, "login friction", 0.9),
            annotated("b", InsightType::Pain, "login friction", 0.7),
            annotated("c", InsightType::Emotion, "delight", 0.8),
        ];
        let graph = fallback_graph(&atoms);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("a", "b"));
        assert!((edge.weight - 0.7).abs() < 1e-6);
        assert_eq!(edge.kind, EdgeKind::SharedLabel);
    }

    #[test]
    fn fallback_themes_group_by_dominant_label() {
        let atoms = vec![
            annotated("a", InsightType::Pain, "login friction", 0.9),
            annotated("b", InsightType::Pain, "login friction", 0.7),
            annotated("c", InsightType::Emotion, "delight", 0.8),
        ];
        let themes = fallback_themes(&atoms);
        assert_eq!(themes.len(), 2);
        let friction = themes.iter().find(|t| t.name == "login friction").unwrap();
        assert_eq!(friction.atom_ids, vec!["a", "b"]);
    }

    #[test]
    fn fallback_style_maps_pain_to_red() {
        let atoms = vec![annotated("a", InsightType::Pain, "login friction", 0.9)];
        let node = GraphNode::from(&atoms[0]);
        let style = fallback_style(&node);
        assert_eq!(style.category, "pain");
        assert_eq!(style.color, "#ff4757");
        assert_eq!(style.label, "login friction");
    }

    #[test]
    fn style_without_insights_is_other() {
        let node = GraphNode {
            id: "x".to_string(),
            text: String::new(),
            speaker: String::new(),
            insights: Vec::new(),
            tags: Vec::new(),
        };
        assert_eq!(fallback_style(&node).category, "other");
    }
}
