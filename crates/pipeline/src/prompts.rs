//! Prompt templates for the pipeline stages. Placeholders are literal tokens
//! replaced by the render helpers, keeping the templates free of `format!`
//! escaping noise.

const NORMALIZER_PROMPT: &str = r#"You are a senior UX research assistant.

You will be given raw transcript text extracted from a PDF. This text may include:
- Page numbers, headers/footers, and other formatting artifacts
- Broken sentences or poor line breaks
- Missing or inconsistent speaker labels
- Boilerplate content unrelated to the conversation

Your task is to return a cleaned and structured transcript that is ready for downstream synthesis.

Instructions:
1. Remove noise such as page numbers, headers/footers, and irrelevant boilerplate.
2. Repair formatting issues like broken lines or mid-sentence splits.
3. Preserve speaker turns clearly. If speaker labels are inconsistent or missing:
   - Use conversational context to separate distinct speakers.
   - Assign clearly differentiated pseudonyms, like "Speaker 1", "Speaker 2", etc.
   - If a real name is obvious, use it instead.
4. If a speaker is guessed, annotate with `[inferred]`.
5. If part of the text is unreadable, mark it as `[unintelligible]`.
6. Do not hallucinate content: clean and segment, never invent new ideas.

Format:
- Output as plain text
- Each paragraph should start with a speaker label, like:

ERIC: I grew up in Pittsburgh. I loved fishing with my dad.
AJENA [inferred]: That sounds peaceful. My family used to hike a lot.

Here is the raw transcript:
---
{raw_text}
---
Return only the cleaned, speaker-separated transcript."#;

const ATOMIZER_PROMPT: &str = r#"You are an "Atomic Evidence Splitter".

Input: cleaned transcript
Output: JSON list of atoms.

Schema per atom:
{
  "id": "<uuid>",
  "speaker": "<speaker>",
  "text": "<1-3 sentence idea>",
  "context": "<±2 sentences for context>",
  "entities": {
    "objects": [],
    "tasks": [],
    "emotions": []
  },
  "confidence": "high|medium|low"
}

Rules:
- Cut only at natural idea boundaries.
- Never merge speakers.
- Entities must appear verbatim in text.
- If unsure, mark confidence=low and shorten text.

Return ONLY valid JSON. No commentary.

Transcript:
{transcript}
"#;

const ANNOTATOR_PROMPT: &str = r#"You are a UX-insight extractor.

Return JSON:

{
  "insights": [
    {"type": "<meta-category>", "label": "<≤3 words>", "weight": 0.0-1.0}
  ],
  "tags": ["keyword1", "keyword2"]
}

Allowed types & examples
persona: mobile user | admin | new hire
pain: login friction | hidden cost | broken flow
emotion: annoyance | anxiety | delight
root_cause: validation bug | slow backend
impact: task abandon | time lost
context: on-the-go | multitasking
device: Android | iPhone | desktop
channel: web | app | phone call
frequency: daily | weekly | first-time
severity: blocker | minor | workaround exists

Rules
- Emit 0-2 insights per type, ≤8 total
- weight = confidence 0-1
- labels verbatim when possible
- skip any you can't ground

Quote:
{atom_text}
"#;

const GRAPH_PROMPT: &str = r#"You are an insight-web architect.

Input: list of annotated atoms (with insights array).

Goals
1. Exact edges: keep "shared label" edges (weight = min weight ≥ 0.7), type "shared_label".
2. Inference edges: create type "inferred" edges when two atoms have semantically related insights (e.g., "login friction" ≈ "wrong password"); weight = average of the two insight weights, threshold ≥ 0.75.
3. Auto-themes: group atoms into named themes (≤ 3 words) if ≥ 3 atoms share dominant insight patterns.
4. Auto-journey: create a lightweight "as-is" journey by ordering atoms chronologically and tagging each step with dominant pain + emotion.

Output JSON:
{
  "nodes": [...],
  "edges": [{"source": "...", "target": "...", "label": "...", "weight": 0.8, "type": "shared_label"}],
  "themes": [
    {"name": "login friction", "atom_ids": [...], "dominant_insights": {"pain": "login friction", "emotion": "frustration"}, "pain_score": 0.95}
  ],
  "journey": [
    {"step": "login attempt", "pain": "wrong password", "emotion": "frustration", "atoms": [...]}
  ]
}

Rules
- Exact edge: same label, both weights ≥ 0.7.
- Inference edge: semantic similarity ≥ 0.75.
- Theme: ≥ 3 atoms.
- Journey: keep chronological order.

Return strict JSON only.

Annotated atoms:
{atoms_json}"#;

const THEME_PROMPT: &str = r#"You are a UX research theme clustering assistant.

Input: a list of annotated atoms, each with speaker, text, insights, and tags.

Your task:
- Cluster the atoms into 3-8 high-level themes.
- Each theme should have:
  - a short, descriptive name (≤4 words)
  - a 1-2 sentence summary
  - a list of atom IDs belonging to the theme
- Do not create overlapping themes.
- Every atom must belong to exactly one theme.
- Use only the information in the atoms and their annotations.

Return strict JSON:
[
  {
    "name": "Theme name",
    "summary": "Short summary of the theme.",
    "atom_ids": ["uuid1", "uuid2"]
  }
]

Here are the annotated atoms:
{atoms_json}
"#;

const ENHANCE_PROMPT: &str = r##"Analyze these user research insights and assign each one:
1. A color (hex code) - red for pain points, green for positive behaviors, blue for technical issues, orange for comparisons, purple for emotions
2. An emoji icon that represents the content
3. A short 1-2 word label that captures the essence
4. A category (pain, behavior, technical, comparison, emotion, other)

Return JSON array with: [{"id": "...", "color": "#ff4757", "icon": "😤", "label": "frustration", "category": "pain"}]

Insights: {nodes_json}
"##;

pub fn normalizer(raw_text: &str) -> String {
    NORMALIZER_PROMPT.replace("{raw_text}", raw_text)
}

pub fn atomizer(transcript: &str) -> String {
    ATOMIZER_PROMPT.replace("{transcript}", transcript)
}

pub fn annotator(atom_text: &str) -> String {
    ANNOTATOR_PROMPT.replace("{atom_text}", atom_text)
}

pub fn graph_builder(atoms_json: &str) -> String {
    GRAPH_PROMPT.replace("{atoms_json}", atoms_json)
}

pub fn theme_clustering(atoms_json: &str) -> String {
    THEME_PROMPT.replace("{atoms_json}", atoms_json)
}

pub fn enhance_graph(nodes_json: &str) -> String {
    ENHANCE_PROMPT.replace("{nodes_json}", nodes_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_payload() {
        let prompt = normalizer("RAW TRANSCRIPT BODY");
        assert!(prompt.contains("RAW TRANSCRIPT BODY"));
        assert!(!prompt.contains("{raw_text}"));
    }

    #[test]
    fn enhance_prompt_keeps_color_example_intact() {
        let prompt = enhance_graph("[]");
        assert!(prompt.contains("\"#ff4757\""));
        assert!(prompt.contains("Insights: []"));
        assert!(!prompt.contains("{nodes_json}"));
    }
}
