//! Transcript splitting into evidence atoms, with chunked processing for
//! transcripts that exceed the single-shot input limit.

use std::thread;
use std::time::Duration;

use synth_core::{pack_lines, repair, Atom};

use crate::config::PipelineConfig;
use crate::extract::{RetryingExtractor, TruncationPolicy};
use crate::prompts;

/// Parse a model response into atoms. The response is repaired before JSON
/// parsing so fenced or comma-damaged output still lands. Entries are decoded
/// one by one: a malformed entry (missing or blank `text`) is dropped without
/// discarding its well-formed neighbors. Every surviving atom is stamped with
/// `source_file`, and an empty result counts as a failed parse so the retry
/// loop gets another shot.
pub fn parse_atoms(raw: &str, source_file: &str) -> Option<Vec<Atom>> {
    let repaired = repair(raw);
    let entries: Vec<serde_json::Value> = serde_json::from_str(&repaired).ok()?;
    let mut atoms: Vec<Atom> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<Atom>(entry).ok())
        .filter(|atom| !atom.text.trim().is_empty())
        .collect();
    if atoms.is_empty() {
        return None;
    }
    for atom in &mut atoms {
        atom.source_file = source_file.to_string();
        if atom.id.is_empty() {
            atom.id = synth_core::new_atom_id();
        }
    }
    Some(atoms)
}

/// Splits a cleaned transcript into atoms, chunking by whole lines when the
/// transcript exceeds the single-shot limit. Each chunk is extracted in
/// isolation: a chunk that exhausts its retries contributes one failure atom
/// without poisoning its neighbors.
pub struct ChunkingAtomizer {
    single_limit: usize,
    retry_limit: usize,
    chunk_size: usize,
    throttle: Duration,
}

impl ChunkingAtomizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            single_limit: config.atomize_single_limit,
            retry_limit: config.atomize_retry_limit,
            chunk_size: config.chunk_size,
            throttle: config.throttle,
        }
    }

    pub fn atomize(
        &self,
        extractor: &RetryingExtractor,
        cleaned: &str,
        source_file: &str,
    ) -> Vec<Atom> {
        if cleaned.len() <= self.single_limit {
            return self.atomize_one(extractor, cleaned, source_file);
        }

        let chunks = pack_lines(cleaned, self.chunk_size);
        let total = chunks.len();
        tracing::info!(source_file, chunks = total, "transcript exceeds single-shot limit, chunking");
        let mut atoms = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let provenance = format!("{source_file} (chunk {})", i + 1);
            atoms.extend(self.atomize_one(extractor, chunk, &provenance));
            if i + 1 < total && !self.throttle.is_zero() {
                thread::sleep(self.throttle);
            }
        }
        atoms
    }

    fn atomize_one(
        &self,
        extractor: &RetryingExtractor,
        transcript: &str,
        source_file: &str,
    ) -> Vec<Atom> {
        let input_len = transcript.len();
        let out = extractor.extract(
            transcript,
            TruncationPolicy::shrinking(self.single_limit, self.retry_limit),
            prompts::atomizer,
            |raw| parse_atoms(raw, source_file),
            |err| vec![Atom::extraction_failure(source_file, input_len, err)],
        );
        if out.degraded {
            tracing::warn!(source_file, attempts = out.attempts, "atomizer degraded to failure atom");
        }
        out.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_fenced_array() {
        let raw = "```json\n[{\"speaker\": \"A\", \"text\": \"hi\"},]\n```";
        let atoms = parse_atoms(raw, "t.pdf").unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].source_file, "t.pdf");
        assert!(!atoms[0].id.is_empty());
    }

    #[test]
    fn parse_keeps_valid_atoms_when_a_sibling_is_malformed() {
        let raw = r#"[{"speaker": "A", "text": "hi"}, {"speaker": "B"}]"#;
        let atoms = parse_atoms(raw, "t.pdf").unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].speaker, "A");
        assert_eq!(atoms[0].text, "hi");
    }

    #[test]
    fn parse_drops_blank_text_entries() {
        let raw = r#"[{"speaker": "A", "text": "   "}, {"speaker": "B", "text": "works"}]"#;
        let atoms = parse_atoms(raw, "t.pdf").unwrap();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].text, "works");
    }

    #[test]
    fn parse_rejects_empty_array() {
        assert!(parse_atoms("[]", "t.pdf").is_none());
    }

    #[test]
    fn parse_rejects_prose() {
        assert!(parse_atoms("Sorry, I cannot help with that.", "t.pdf").is_none());
    }
}
