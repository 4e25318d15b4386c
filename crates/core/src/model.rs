use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Named entity lists extracted alongside an atom. Each entry is expected to
/// appear verbatim in the atom text; that is a soft invariant the extractor
/// is asked for, checked by [`Atom::verbatim_entities`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
}

impl Entities {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.objects
            .iter()
            .chain(&self.tasks)
            .chain(&self.emotions)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Low
    }
}

/// Smallest self-contained unit of evidence extracted from a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    #[serde(default = "new_atom_id")]
    pub id: String,
    #[serde(default)]
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub source_file: String,
}

pub fn new_atom_id() -> String {
    Uuid::new_v4().to_string()
}

impl Atom {
    /// Deterministic substitute atom emitted when extraction repeatedly
    /// fails. Flagged by the sentinel speaker so downstream consumers can
    /// detect degraded output.
    pub fn extraction_failure(source_file: &str, input_len: usize, detail: &str) -> Self {
        Self {
            id: new_atom_id(),
            speaker: "ERROR".to_string(),
            text: format!(
                "[Atomizer failed. Input length: {input_len} chars. Last error: {detail}]"
            ),
            context: String::new(),
            entities: Entities::default(),
            confidence: Confidence::Low,
            source_file: source_file.to_string(),
        }
    }

    pub fn is_extraction_failure(&self) -> bool {
        self.speaker == "ERROR"
    }

    /// Soft invariant: every entity string occurs verbatim in `text`.
    pub fn verbatim_entities(&self) -> bool {
        self.entities.iter().all(|e| self.text.contains(e))
    }
}

/// Closed vocabulary of insight categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Persona,
    Pain,
    Emotion,
    RootCause,
    Impact,
    Context,
    Device,
    Channel,
    Frequency,
    Severity,
}

impl InsightType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "persona" => Some(Self::Persona),
            "pain" => Some(Self::Pain),
            "emotion" => Some(Self::Emotion),
            "root_cause" => Some(Self::RootCause),
            "impact" => Some(Self::Impact),
            "context" => Some(Self::Context),
            "device" => Some(Self::Device),
            "channel" => Some(Self::Channel),
            "frequency" => Some(Self::Frequency),
            "severity" => Some(Self::Severity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::Pain => "pain",
            Self::Emotion => "emotion",
            Self::RootCause => "root_cause",
            Self::Impact => "impact",
            Self::Context => "context",
            Self::Device => "device",
            Self::Channel => "channel",
            Self::Frequency => "frequency",
            Self::Severity => "severity",
        }
    }
}

/// A typed, weighted semantic tag attached to an atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightType,
    pub label: String,
    pub weight: f32,
}

impl Insight {
    /// Lenient constructor for repaired model output: unknown types and
    /// label-less entries are dropped, weights clamped into [0, 1].
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = InsightType::parse(value.get("type")?.as_str()?)?;
        let label = value.get("label")?.as_str()?.trim().to_string();
        if label.is_empty() {
            return None;
        }
        let weight = value
            .get("weight")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0) as f32;
        Some(Self {
            kind,
            label,
            weight,
        })
    }
}

/// The insight/tag payload produced by the annotator for one atom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Annotation {
    /// Lenient parse from a repaired model response object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let insights = obj
            .get("insights")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Insight::from_value).collect())
            .unwrap_or_default();
        let tags = obj
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let mut annotation = Self { insights, tags };
        annotation.clamp();
        Some(annotation)
    }

    /// Enforces the annotation invariants: at most 2 insights per type and
    /// at most 8 in total, keeping the highest-weight entries.
    pub fn clamp(&mut self) {
        self.insights
            .sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        let mut per_type: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut kept = Vec::new();
        for insight in self.insights.drain(..) {
            let key = type_key(insight.kind);
            let count = per_type.entry(key).or_insert(0);
            if *count < 2 && kept.len() < 8 {
                *count += 1;
                kept.push(insight);
            }
        }
        self.insights = kept;
    }
}

fn type_key(kind: InsightType) -> &'static str {
    kind.as_str()
}

/// An atom enriched with insights and free-keyword tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedAtom {
    #[serde(flatten)]
    pub atom: Atom,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AnnotatedAtom {
    pub fn new(atom: Atom, annotation: Annotation) -> Self {
        Self {
            atom,
            insights: annotation.insights,
            tags: annotation.tags,
        }
    }

    /// (type, label) pairs shared with another annotated atom.
    pub fn shared_insights(&self, other: &Self) -> Vec<(InsightType, String)> {
        let mine: HashSet<(InsightType, &str)> = self
            .insights
            .iter()
            .map(|i| (i.kind, i.label.as_str()))
            .collect();
        other
            .insights
            .iter()
            .filter(|i| mine.contains(&(i.kind, i.label.as_str())))
            .map(|i| (i.kind, i.label.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    SharedLabel,
    Inferred,
}

impl Default for EdgeKind {
    fn default() -> Self {
        EdgeKind::SharedLabel
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    pub weight: f32,
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&AnnotatedAtom> for GraphNode {
    fn from(atom: &AnnotatedAtom) -> Self {
        Self {
            id: atom.atom.id.clone(),
            text: atom.atom.text.clone(),
            speaker: atom.atom.speaker.clone(),
            insights: atom.insights.clone(),
            tags: atom.tags.clone(),
        }
    }
}

/// A named cluster of atoms sharing dominant insight patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub atom_ids: Vec<String>,
    #[serde(default)]
    pub dominant_insights: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pain_score: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyStep {
    pub step: String,
    #[serde(default)]
    pub pain: String,
    #[serde(default)]
    pub emotion: String,
    #[serde(default)]
    pub atoms: Vec<String>,
}

/// Relationship graph over annotated atoms, with optional theme clusters and
/// an as-is journey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphArtifact {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub clusters: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub themes: Vec<Theme>,
    #[serde(default)]
    pub journey: Vec<JourneyStep>,
}

impl GraphArtifact {
    /// Drops edges whose endpoints are not graph nodes and prunes unknown
    /// atom ids from themes and journey steps. Returns the number of
    /// elements removed.
    pub fn prune_dangling(&mut self) -> usize {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        let before = self.edges.len();
        self.edges
            .retain(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()));
        let mut removed = before - self.edges.len();
        for theme in &mut self.themes {
            let theme_before = theme.atom_ids.len();
            theme.atom_ids.retain(|id| ids.contains(id.as_str()));
            removed += theme_before - theme.atom_ids.len();
        }
        for step in &mut self.journey {
            let step_before = step.atoms.len();
            step.atoms.retain(|id| ids.contains(id.as_str()));
            removed += step_before - step.atoms.len();
        }
        removed
    }
}

/// Repairs theme coverage over `node_ids`: duplicate assignments keep their
/// first theme, unassigned atoms are gathered into a trailing "unthemed"
/// bucket, and themes left empty are dropped.
pub fn repair_theme_coverage(themes: &mut Vec<Theme>, node_ids: &[String]) {
    let known: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let mut seen: HashSet<String> = HashSet::new();
    for theme in themes.iter_mut() {
        theme
            .atom_ids
            .retain(|id| known.contains(id.as_str()) && seen.insert(id.clone()));
    }
    themes.retain(|t| !t.atom_ids.is_empty());
    let leftover: Vec<String> = node_ids
        .iter()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect();
    if !leftover.is_empty() {
        themes.push(Theme {
            name: "unthemed".to_string(),
            summary: "Atoms not covered by any clustered theme.".to_string(),
            atom_ids: leftover,
            ..Theme::default()
        });
    }
}

/// Visual styling assigned to a graph node by the enhancement side-path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    pub id: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub category: String,
}
