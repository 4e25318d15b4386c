use std::fs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use synth_core::{PathResolver, PipelineError, ProjectRef, QualityStatus, Stage};
use synth_llm::{LlmRequest, LlmResponse, TextTransformer};
use synth_pipeline::{CachedArtifact, Pipeline, PipelineConfig};
use tempfile::tempdir;

struct Scripted<F> {
    calls: AtomicU32,
    reply: F,
}

impl<F> Scripted<F>
where
    F: Fn(u32, &LlmRequest) -> anyhow::Result<LlmResponse> + Send + Sync,
{
    fn new(reply: F) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            reply,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> TextTransformer for Scripted<F>
where
    F: Fn(u32, &LlmRequest) -> anyhow::Result<LlmResponse> + Send + Sync,
{
    fn transform(&self, req: &LlmRequest) -> anyhow::Result<LlmResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.reply)(n, req)
    }
}

const ATOM_REPLY: &str = r#"[{"speaker": "P1", "text": "The login kept failing.", "context": "", "entities": {"objects": [], "tasks": [], "emotions": []}, "confidence": "high"}]"#;

fn seed_cleaned(root: &std::path::Path, project: &str, filename: &str, body: &str) {
    let paths = PathResolver::new(root);
    let project = ProjectRef::new(project).unwrap();
    let path = paths.resolve(&project, Stage::Cleaned, filename).unwrap();
    fs::write(path, body).unwrap();
}

fn seed_upload(root: &std::path::Path, project: &str, filename: &str) {
    let paths = PathResolver::new(root);
    let project = ProjectRef::new(project).unwrap();
    let path = paths.resolve(&project, Stage::Uploads, filename).unwrap();
    fs::write(path, b"%PDF-1.4 stub").unwrap();
}

#[test]
fn normalize_serves_cached_artifact_without_any_calls() {
    let dir = tempdir().unwrap();
    seed_upload(dir.path(), "demo", "t.pdf");
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: already cleaned transcript.");
    let stub = Scripted::new(|_, _| Err(anyhow!("must not be called")));
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub.clone());

    let cleaned = pipeline.normalize("demo", "t.pdf").unwrap();
    assert_eq!(cleaned, "P1: already cleaned transcript.");
    assert_eq!(stub.calls(), 0);
}

#[test]
fn atomize_computes_once_then_reuses_artifact() {
    let dir = tempdir().unwrap();
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: short transcript.");
    let stub = Scripted::new(|_, _| Ok(LlmResponse::text(ATOM_REPLY)));
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub.clone());

    let first = pipeline.atomize("demo", "t.pdf").unwrap();
    let second = pipeline.atomize("demo", "t.pdf").unwrap();
    assert_eq!(stub.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first[0].source_file, "t.pdf");
}

#[test]
fn long_transcript_is_chunked_with_provenance() {
    let dir = tempdir().unwrap();
    // ~21.4k chars of whole lines, chunk_size 8000 -> 3 chunks.
    let line = "P1: I tried to log in again and the form cleared everything I had typed before, twice in a row now.";
    let transcript = vec![line; 200].join("\n");
    assert!(transcript.len() > 15_000);
    seed_cleaned(dir.path(), "demo", "t.pdf", &transcript);
    let stub = Scripted::new(|_, _| Ok(LlmResponse::text(ATOM_REPLY)));
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub.clone());

    let atoms = pipeline.atomize("demo", "t.pdf").unwrap();
    assert_eq!(stub.calls(), 3);
    assert_eq!(atoms.len(), 3);
    assert_eq!(atoms[0].source_file, "t.pdf (chunk 1)");
    assert_eq!(atoms[2].source_file, "t.pdf (chunk 3)");
}

#[test]
fn atomizer_exhausts_retries_then_emits_failure_atom() {
    let dir = tempdir().unwrap();
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: short transcript.");
    let stub = Scripted::new(|_, _| Err(anyhow!("upstream unavailable")));
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub.clone());

    let atoms = pipeline.atomize("demo", "t.pdf").unwrap();
    assert_eq!(stub.calls(), 3);
    assert_eq!(atoms.len(), 1);
    assert!(atoms[0].is_extraction_failure());
    assert!(atoms[0].text.contains("upstream unavailable"));
}

#[test]
fn atomize_without_cleaned_stage_names_the_missing_stage() {
    let dir = tempdir().unwrap();
    let stub = Scripted::new(|_, _| Ok(LlmResponse::text(ATOM_REPLY)));
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    let err = pipeline.atomize("demo", "t.pdf").unwrap_err();
    match err {
        PipelineError::PreconditionNotMet { missing, filename } => {
            assert_eq!(missing, Stage::Cleaned);
            assert_eq!(filename, "t.pdf");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn annotate_clamps_and_survives_per_atom_failures() {
    let dir = tempdir().unwrap();
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: short transcript.");
    // Ten pain insights; the annotation invariant keeps at most two per type.
    let fat_annotation = {
        let insights: Vec<String> = (0..10)
            .map(|i| format!(r#"{{"type": "pain", "label": "pain {i}", "weight": 0.{i}}}"#))
            .collect();
        format!(r#"{{"insights": [{}], "tags": ["login"]}}"#, insights.join(","))
    };
    let stub = Scripted::new(move |_, req| {
        if req.user.contains("Atomic Evidence Splitter") {
            return Ok(LlmResponse::text(ATOM_REPLY));
        }
        Ok(LlmResponse::text(fat_annotation.clone()))
    });
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    let atoms = pipeline.atomize("demo", "t.pdf").unwrap();
    let annotated = pipeline.annotate("demo", "t.pdf", Some(atoms)).unwrap();
    assert_eq!(annotated.len(), 1);
    assert_eq!(annotated[0].insights.len(), 2);
    assert_eq!(annotated[0].tags, vec!["login"]);
}

#[test]
fn graph_falls_back_to_shared_insight_edges() {
    let dir = tempdir().unwrap();
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: short transcript.");
    let two_atoms = r#"[
        {"speaker": "P1", "text": "Login failed again."},
        {"speaker": "P2", "text": "I could not log in either."}
    ]"#;
    let annotation = r#"{"insights": [{"type": "pain", "label": "login friction", "weight": 0.9}], "tags": []}"#;
    let stub = Scripted::new(move |_, req| {
        if req.user.contains("Atomic Evidence Splitter") {
            Ok(LlmResponse::text(two_atoms))
        } else if req.user.contains("UX-insight extractor") {
            Ok(LlmResponse::text(annotation))
        } else {
            // Graph builder never yields valid JSON.
            Ok(LlmResponse::text("no graph for you"))
        }
    });
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    let atoms = pipeline.atomize("demo", "t.pdf").unwrap();
    pipeline.annotate("demo", "t.pdf", Some(atoms)).unwrap();
    let graph = pipeline.graph("demo", "t.pdf").unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].label, "login friction");
}

#[test]
fn themes_cover_every_atom_after_repair() {
    let dir = tempdir().unwrap();
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: short transcript.");
    let annotation = r#"{"insights": [], "tags": []}"#;
    let stub = Scripted::new(move |_, req| {
        if req.user.contains("Atomic Evidence Splitter") {
            Ok(LlmResponse::text(ATOM_REPLY))
        } else if req.user.contains("UX-insight extractor") {
            Ok(LlmResponse::text(annotation))
        } else {
            // Clustering returns an empty list; coverage repair buckets
            // every atom.
            Ok(LlmResponse::text("[]"))
        }
    });
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    let atoms = pipeline.atomize("demo", "t.pdf").unwrap();
    let annotated = pipeline.annotate("demo", "t.pdf", Some(atoms)).unwrap();
    let themes = pipeline.themes("demo", "t.pdf").unwrap();
    assert_eq!(themes.len(), 1);
    assert_eq!(themes[0].name, "unthemed");
    assert_eq!(themes[0].atom_ids.len(), annotated.len());
}

#[test]
fn quality_guard_recomputes_and_persists_timestamped_report() {
    let dir = tempdir().unwrap();
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: short transcript.");
    let annotation = r#"{"insights": [{"type": "pain", "label": "login friction", "weight": 0.9}], "tags": []}"#;
    let stub = Scripted::new(move |_, req| {
        if req.user.contains("Atomic Evidence Splitter") {
            Ok(LlmResponse::text(ATOM_REPLY))
        } else if req.user.contains("UX-insight extractor") {
            Ok(LlmResponse::text(annotation))
        } else {
            Ok(LlmResponse::text("[]"))
        }
    });
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    let atoms = pipeline.atomize("demo", "t.pdf").unwrap();
    pipeline.annotate("demo", "t.pdf", Some(atoms)).unwrap();
    pipeline.themes("demo", "t.pdf").unwrap();
    let report = pipeline.quality_guard("demo", "t.pdf").unwrap();
    // One theme backed by a single quote: evidence check is critical.
    assert_eq!(report.status, QualityStatus::Failed);

    let quality_dir = dir.path().join("demo").join("quality");
    let reports: Vec<_> = fs::read_dir(&quality_dir).unwrap().collect();
    assert_eq!(reports.len(), 1);
    pipeline.quality_guard("demo", "t.pdf").unwrap();
    let reports: Vec<_> = fs::read_dir(&quality_dir).unwrap().collect();
    assert!(!reports.is_empty());
}

#[test]
fn cached_quality_serves_newest_persisted_report() {
    let dir = tempdir().unwrap();
    seed_cleaned(dir.path(), "demo", "t.pdf", "P1: short transcript.");
    let annotation = r#"{"insights": [{"type": "pain", "label": "login friction", "weight": 0.9}], "tags": []}"#;
    let stub = Scripted::new(move |_, req| {
        if req.user.contains("Atomic Evidence Splitter") {
            Ok(LlmResponse::text(ATOM_REPLY))
        } else if req.user.contains("UX-insight extractor") {
            Ok(LlmResponse::text(annotation))
        } else {
            Ok(LlmResponse::text("[]"))
        }
    });
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    assert!(pipeline.cached("demo", "quality", "t.pdf").unwrap().is_none());

    let atoms = pipeline.atomize("demo", "t.pdf").unwrap();
    pipeline.annotate("demo", "t.pdf", Some(atoms)).unwrap();
    pipeline.themes("demo", "t.pdf").unwrap();
    pipeline.quality_guard("demo", "t.pdf").unwrap();

    let report = pipeline
        .cached("demo", "quality", "t.pdf")
        .unwrap()
        .expect("persisted report should be served");
    let CachedArtifact::Json(value) = report else {
        panic!("quality report should be JSON");
    };
    assert_eq!(value["status"], "FAILED");
    assert_eq!(value["project"], "demo");
    // A report for a different source file stays invisible.
    assert!(pipeline
        .cached("demo", "quality", "other.pdf")
        .unwrap()
        .is_none());
}

#[test]
fn upload_list_and_delete_round_trip() {
    let dir = tempdir().unwrap();
    let stub = Scripted::new(|_, _| Ok(LlmResponse::text(ATOM_REPLY)));
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    pipeline.upload("Demo Project", "t.pdf", b"%PDF-1.4 stub").unwrap();
    let projects = pipeline.list_projects().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].project, "demo-project");
    assert_eq!(projects[0].files.len(), 1);
    assert!(!projects[0].files[0].cleaned);

    pipeline.delete_project("Demo Project").unwrap();
    assert!(pipeline.list_projects().unwrap().is_empty());
    // Deleting an absent project is a no-op.
    pipeline.delete_project("Demo Project").unwrap();
}

#[test]
fn upload_rejects_non_pdf() {
    let dir = tempdir().unwrap();
    let stub = Scripted::new(|_, _| Ok(LlmResponse::text(ATOM_REPLY)));
    let pipeline = Pipeline::new(PipelineConfig::unthrottled(dir.path()), stub);

    let err = pipeline.upload("demo", "notes.txt", b"hello").unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}
