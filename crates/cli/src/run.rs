use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use synth_core::QualityStatus;
use synth_llm::LlmClient;
use synth_pipeline::{CachedArtifact, Pipeline, PipelineConfig};

use crate::logging;

pub fn build_pipeline() -> Result<Pipeline> {
    let config = PipelineConfig::from_env()?;
    logging::verbose(format!(
        "provider {} model {} data dir {}",
        config.provider.as_str(),
        config.model,
        config.data_dir.display()
    ));
    let client = LlmClient::new(config.provider, config.model.clone())?;
    Ok(Pipeline::new(config, Arc::new(client)))
}

pub fn ingest(pipeline: &Pipeline, project: &str, input: &str) -> Result<()> {
    let path = Path::new(input);
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no usable filename in {input}"))?;
    let bytes = fs::read(path).with_context(|| format!("reading {input}"))?;
    let stored = pipeline.upload(project, filename, &bytes)?;
    logging::info(format!("stored {} ({} bytes)", stored.display(), bytes.len()));
    Ok(())
}

pub fn run_all(pipeline: &Pipeline, project: &str, filename: &str) -> Result<()> {
    logging::stage("normalize", filename);
    let cleaned = pipeline.normalize(project, filename)?;
    logging::verbose(format!("cleaned transcript: {} chars", cleaned.len()));

    logging::stage("atomize", filename);
    let atoms = pipeline.atomize(project, filename)?;
    logging::info(format!("{} atoms", atoms.len()));

    logging::stage("annotate", filename);
    let annotated = pipeline.annotate(project, filename, None)?;
    let insights: usize = annotated.iter().map(|a| a.insights.len()).sum();
    logging::info(format!("{insights} insights across {} atoms", annotated.len()));

    logging::stage("graph", filename);
    let graph = pipeline.graph(project, filename)?;
    logging::info(format!(
        "{} nodes, {} edges",
        graph.nodes.len(),
        graph.edges.len()
    ));

    logging::stage("themes", filename);
    let themes = pipeline.themes(project, filename)?;
    logging::info(format!("{} themes", themes.len()));

    logging::stage("quality", filename);
    let report = pipeline.quality_guard(project, filename)?;
    let verdict = match report.status {
        QualityStatus::Passed => "PASSED",
        QualityStatus::Failed => "FAILED",
    };
    logging::info(format!(
        "{verdict} (score {:.2}, {}/{} checks passed)",
        report.overall_score, report.summary.passed, report.summary.total_checks
    ));
    for recommendation in &report.recommendations {
        logging::info(format!("  - {recommendation}"));
    }
    Ok(())
}

pub fn run_stage(pipeline: &Pipeline, project: &str, filename: &str, stage: &str) -> Result<()> {
    logging::stage(stage, filename);
    match stage {
        "normalize" => {
            pipeline.normalize(project, filename)?;
        }
        "atomize" => {
            let atoms = pipeline.atomize(project, filename)?;
            logging::info(format!("{} atoms", atoms.len()));
        }
        "annotate" => {
            pipeline.annotate(project, filename, None)?;
        }
        "graph" => {
            pipeline.graph(project, filename)?;
        }
        "themes" => {
            pipeline.themes(project, filename)?;
        }
        "enhance-graph" => {
            pipeline.enhance_graph(project, filename)?;
        }
        "quality" => {
            let report = pipeline.quality_guard(project, filename)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        other => bail!("unknown stage {other:?}"),
    }
    Ok(())
}

pub fn list_projects(pipeline: &Pipeline) -> Result<()> {
    let projects = pipeline.list_projects()?;
    if projects.is_empty() {
        logging::info("no projects");
        return Ok(());
    }
    for project in projects {
        println!("{}", project.project);
        for file in project.files {
            let mark = |done| if done { "x" } else { " " };
            println!(
                "  {} cleaned[{}] atoms[{}] annotated[{}] graph[{}] themes[{}]",
                file.filename,
                mark(file.cleaned),
                mark(file.atoms),
                mark(file.annotated),
                mark(file.graph),
                mark(file.themes),
            );
        }
    }
    Ok(())
}

pub fn show(pipeline: &Pipeline, project: &str, filename: &str, stage: &str) -> Result<()> {
    match pipeline.cached(project, stage, filename)? {
        Some(CachedArtifact::Text(text)) => println!("{text}"),
        Some(CachedArtifact::Json(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?)
        }
        None => bail!("no cached {stage} artifact for {filename}"),
    }
    Ok(())
}
