mod chunk;
mod error;
mod model;
mod paths;
mod pdf;
mod quality;
mod repair;
mod store;

pub use chunk::pack_lines;
pub use error::{PipelineError, Result};
pub use model::{
    new_atom_id, repair_theme_coverage, AnnotatedAtom, Annotation, Atom, Confidence, EdgeKind,
    Entities, GraphArtifact, GraphEdge, GraphNode, Insight, InsightType, JourneyStep, NodeStyle,
    Theme,
};
pub use paths::{PathResolver, ProjectRef, Stage};
pub use pdf::extract_pdf_text;
pub use quality::{
    run_quality_guard, QualityCheck, QualityReport, QualityStatus, QualitySummary, Severity,
};
pub use repair::repair;
pub use store::StageCache;
