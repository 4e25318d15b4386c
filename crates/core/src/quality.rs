use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{AnnotatedAtom, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    pub passed: bool,
    pub score: f32,
    pub severity: Severity,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub critical_issues: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub timestamp: DateTime<Utc>,
    pub project: String,
    pub overall_score: f32,
    pub status: QualityStatus,
    pub summary: QualitySummary,
    pub checks: Vec<QualityCheck>,
    pub recommendations: Vec<String>,
}

static GENERIC_STATEMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(users want|people need|everyone thinks|most users|generally speaking|it is clear that|obviously|of course|common sense|as we all know)\b",
    )
    .expect("generic statement regex")
});
static CAUSAL_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(because|causes|leads to|results in|therefore|as a result|due to)\b")
        .expect("causal language regex")
});

const GENERIC_PERSONAS: &[&str] = &[
    "busy professional",
    "tech-savvy user",
    "millennial",
    "power user",
    "casual user",
    "average person",
    "typical user",
    "general user",
];

const REQUIRED_BOARD_ELEMENTS: &[&str] =
    &["journey_map", "theme_clusters", "quote_bank", "opportunities"];

/// Runs the full check suite over the synthesis outputs and produces the
/// report. Always recomputed; callers persist it with a timestamped name
/// rather than treating it as a cache.
pub fn run_quality_guard(
    project: &str,
    themes: &[Theme],
    atoms: &[AnnotatedAtom],
    board: Option<&Value>,
) -> QualityReport {
    let by_id: BTreeMap<&str, &AnnotatedAtom> =
        atoms.iter().map(|a| (a.atom.id.as_str(), a)).collect();
    let mut checks = Vec::new();
    for theme in themes {
        checks.push(theme_evidence_check(theme));
        checks.push(theme_diversity_check(theme, &by_id));
    }
    checks.push(quote_uniqueness_check(themes));
    checks.push(participant_diversity_check(themes, &by_id));
    checks.push(generic_statements_check(themes, atoms));
    checks.push(causal_statements_check(themes, &by_id));
    checks.push(persona_clarity_check(themes));
    checks.push(data_integrity_check(themes, atoms));
    checks.push(board_completeness_check(board));
    build_report(project, checks)
}

fn theme_evidence_check(theme: &Theme) -> QualityCheck {
    let evidence_count = theme.atom_ids.len();
    let passed = evidence_count >= 2;
    QualityCheck {
        name: format!("theme_evidence_{}", theme.name),
        passed,
        score: (evidence_count as f32 / 3.0).min(1.0),
        severity: if passed {
            Severity::Info
        } else {
            Severity::Critical
        },
        details: json!({
            "theme": theme.name,
            "evidence_count": evidence_count,
            "required_minimum": 2,
        }),
        recommendations: vec![if passed {
            "Evidence sufficient".to_string()
        } else {
            format!("Add {} more supporting quotes", 2 - evidence_count)
        }],
    }
}

fn theme_diversity_check(theme: &Theme, by_id: &BTreeMap<&str, &AnnotatedAtom>) -> QualityCheck {
    let speakers: HashSet<&str> = theme
        .atom_ids
        .iter()
        .filter_map(|id| by_id.get(id.as_str()))
        .map(|a| a.atom.speaker.as_str())
        .collect();
    let passed = speakers.len() >= 2;
    QualityCheck {
        name: format!("theme_diversity_{}", theme.name),
        passed,
        score: (speakers.len() as f32 / 3.0).min(1.0),
        severity: if passed {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: json!({
            "theme": theme.name,
            "unique_participants": speakers.len(),
            "total_quotes": theme.atom_ids.len(),
        }),
        recommendations: vec![if passed {
            "Diversity sufficient".to_string()
        } else {
            format!(
                "Include perspectives from {} more participants",
                2 - speakers.len()
            )
        }],
    }
}

fn quote_uniqueness_check(themes: &[Theme]) -> QualityCheck {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let mut total = 0usize;
    for theme in themes {
        for id in &theme.atom_ids {
            total += 1;
            if !seen.insert(id.as_str()) {
                duplicates.push(id.clone());
            }
        }
    }
    let passed = duplicates.is_empty();
    QualityCheck {
        name: "quote_uniqueness".to_string(),
        passed,
        score: if passed { 1.0 } else { 0.5 },
        severity: if passed {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: json!({
            "total_quotes": total,
            "unique_quotes": seen.len(),
            "duplicate_count": duplicates.len(),
            "duplicates": duplicates.iter().take(5).collect::<Vec<_>>(),
        }),
        recommendations: vec![if passed {
            "All quotes are unique".to_string()
        } else {
            "Remove duplicate quotes".to_string()
        }],
    }
}

fn participant_diversity_check(
    themes: &[Theme],
    by_id: &BTreeMap<&str, &AnnotatedAtom>,
) -> QualityCheck {
    let mut all: HashSet<&str> = HashSet::new();
    let mut per_theme = BTreeMap::new();
    for theme in themes {
        let speakers: HashSet<&str> = theme
            .atom_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .map(|a| a.atom.speaker.as_str())
            .collect();
        all.extend(speakers.iter().copied());
        per_theme.insert(theme.name.clone(), speakers.len());
    }
    let passed = all.len() >= 3;
    QualityCheck {
        name: "participant_diversity".to_string(),
        passed,
        score: (all.len() as f32 / 5.0).min(1.0),
        severity: if passed {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: json!({
            "total_unique_participants": all.len(),
            "themes": themes.len(),
            "participants_per_theme": per_theme,
        }),
        recommendations: vec![if passed {
            "Diversity sufficient".to_string()
        } else {
            format!(
                "Include perspectives from {} more participants",
                3 - all.len()
            )
        }],
    }
}

fn generic_statements_check(themes: &[Theme], atoms: &[AnnotatedAtom]) -> QualityCheck {
    let mut offenders = Vec::new();
    for theme in themes {
        if let Some(m) = GENERIC_STATEMENTS.find(&theme.summary) {
            offenders.push(json!({"theme": theme.name, "pattern": m.as_str()}));
        }
    }
    for atom in atoms {
        for insight in &atom.insights {
            if let Some(m) = GENERIC_STATEMENTS.find(&insight.label) {
                offenders.push(json!({"atom": atom.atom.id, "pattern": m.as_str()}));
            }
        }
    }
    let passed = offenders.is_empty();
    QualityCheck {
        name: "generic_statements".to_string(),
        passed,
        score: if passed { 1.0 } else { 0.7 },
        severity: if passed {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: json!({
            "generic_count": offenders.len(),
            "examples": offenders.iter().take(3).collect::<Vec<_>>(),
        }),
        recommendations: vec![if passed {
            "No generic statements found".to_string()
        } else {
            "Replace generic statements with specific evidence".to_string()
        }],
    }
}

fn causal_statements_check(themes: &[Theme], by_id: &BTreeMap<&str, &AnnotatedAtom>) -> QualityCheck {
    let mut ungrounded = Vec::new();
    for theme in themes {
        if !CAUSAL_LANGUAGE.is_match(&theme.summary) {
            continue;
        }
        let supporting = theme
            .atom_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .filter(|a| CAUSAL_LANGUAGE.is_match(&a.atom.text))
            .count();
        if supporting < 2 {
            ungrounded.push(json!({
                "theme": theme.name,
                "supporting_quotes": supporting,
            }));
        }
    }
    let passed = ungrounded.is_empty();
    QualityCheck {
        name: "causal_statements".to_string(),
        passed,
        score: if passed { 1.0 } else { 0.8 },
        severity: if passed {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: json!({
            "ungrounded_count": ungrounded.len(),
            "examples": ungrounded.iter().take(2).collect::<Vec<_>>(),
        }),
        recommendations: vec![if passed {
            "All causal statements are grounded".to_string()
        } else {
            "Add supporting evidence for causal claims".to_string()
        }],
    }
}

fn persona_clarity_check(themes: &[Theme]) -> QualityCheck {
    let mut offenders = Vec::new();
    for theme in themes {
        let summary = theme.summary.to_lowercase();
        for persona in GENERIC_PERSONAS {
            if summary.contains(persona) {
                offenders.push(json!({"theme": theme.name, "persona": persona}));
            }
        }
    }
    let passed = offenders.is_empty();
    QualityCheck {
        name: "persona_clarity".to_string(),
        passed,
        score: if passed { 1.0 } else { 0.6 },
        severity: if passed {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: json!({
            "generic_personas_count": offenders.len(),
            "examples": offenders.iter().take(3).collect::<Vec<_>>(),
        }),
        recommendations: vec![if passed {
            "Personas are specific and grounded".to_string()
        } else {
            "Replace generic personas with specific participant descriptions".to_string()
        }],
    }
}

fn data_integrity_check(themes: &[Theme], atoms: &[AnnotatedAtom]) -> QualityCheck {
    let mut issues = Vec::new();
    for theme in themes {
        if theme.name.trim().is_empty() {
            issues.push("theme missing name".to_string());
        }
        if theme.atom_ids.is_empty() {
            issues.push(format!("theme '{}' has no evidence", theme.name));
        }
    }
    for atom in atoms {
        if atom.atom.text.trim().is_empty() {
            issues.push(format!("atom '{}' missing text", atom.atom.id));
        }
    }
    let passed = issues.is_empty();
    QualityCheck {
        name: "data_integrity".to_string(),
        passed,
        score: if passed { 1.0 } else { 0.5 },
        severity: if passed {
            Severity::Info
        } else {
            Severity::Critical
        },
        details: json!({
            "issue_count": issues.len(),
            "issues": issues.iter().take(5).collect::<Vec<_>>(),
        }),
        recommendations: vec![if passed {
            "Data integrity maintained".to_string()
        } else {
            "Complete missing data fields".to_string()
        }],
    }
}

fn board_completeness_check(board: Option<&Value>) -> QualityCheck {
    let missing: Vec<&str> = match board {
        Some(board) => {
            let elements = board
                .get("elements")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            REQUIRED_BOARD_ELEMENTS
                .iter()
                .filter(|wanted| {
                    !elements.values().any(|e| {
                        e.pointer("/metadata/type").and_then(Value::as_str) == Some(**wanted)
                    })
                })
                .copied()
                .collect()
        }
        None => REQUIRED_BOARD_ELEMENTS.to_vec(),
    };
    let passed = missing.is_empty();
    QualityCheck {
        name: "board_completeness".to_string(),
        passed,
        score: if passed { 1.0 } else { 0.8 },
        severity: if passed {
            Severity::Info
        } else {
            Severity::Warning
        },
        details: json!({
            "board_present": board.is_some(),
            "missing_elements": missing,
        }),
        recommendations: vec![if passed {
            "Board is complete".to_string()
        } else {
            format!("Add missing elements: {}", missing.join(", "))
        }],
    }
}

fn build_report(project: &str, checks: Vec<QualityCheck>) -> QualityReport {
    let critical_failed = checks
        .iter()
        .filter(|c| c.severity == Severity::Critical && !c.passed)
        .count();
    let warnings = checks
        .iter()
        .filter(|c| c.severity == Severity::Warning && !c.passed)
        .count();
    let passed = checks.iter().filter(|c| c.passed).count();
    let overall_score = if checks.is_empty() {
        0.0
    } else {
        checks.iter().map(|c| c.score).sum::<f32>() / checks.len() as f32
    };
    let mut recommendations: Vec<String> = Vec::new();
    for check in checks.iter().filter(|c| !c.passed) {
        for rec in &check.recommendations {
            if !recommendations.contains(rec) {
                recommendations.push(rec.clone());
            }
        }
    }
    QualityReport {
        timestamp: Utc::now(),
        project: project.to_string(),
        overall_score,
        status: if critical_failed == 0 {
            QualityStatus::Passed
        } else {
            QualityStatus::Failed
        },
        summary: QualitySummary {
            total_checks: checks.len(),
            passed,
            failed: checks.len() - passed,
            critical_issues: critical_failed,
            warnings,
        },
        checks,
        recommendations,
    }
}
