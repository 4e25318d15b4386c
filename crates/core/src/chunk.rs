/// Greedily packs whole lines into chunks of at most `chunk_size` characters,
/// preserving input order. A line is never split across chunks, so a single
/// oversized line may exceed `chunk_size` on its own.
pub fn pack_lines(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split('\n') {
        if !current.is_empty() && current.len() + line.len() > chunk_size {
            push_chunk(&mut chunks, &current);
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }
    push_chunk(&mut chunks, &current);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = pack_lines("SPEAKER 1: Hello\nSPEAKER 2: Hi", 8000);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("SPEAKER 2"));
    }

    #[test]
    fn packs_whole_lines_in_order() {
        let text = (0..40)
            .map(|i| format!("line {i:02} {}", "x".repeat(90)))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = pack_lines(&text, 1000);
        assert!(chunks.len() > 1);
        let rejoined = chunks.join("\n");
        for i in 0..40 {
            let needle = format!("line {i:02}");
            assert!(rejoined.contains(&needle));
        }
        // No chunk splits a line: every chunk starts at a line boundary.
        for chunk in &chunks {
            assert!(chunk.starts_with("line "));
        }
    }

    #[test]
    fn twenty_k_transcript_with_8k_chunks_gives_three() {
        // 200 lines of ~100 chars each, mirroring a long cleaned transcript.
        let text = (0..200)
            .map(|i| format!("SPEAKER {}: {}", (i % 3) + 1, "word ".repeat(19)))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.len() >= 20_000 && text.len() < 21_500);
        let chunks = pack_lines(&text, 8000);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            // Boundary slack only from whole-line packing.
            assert!(chunk.len() <= 8000 + 110);
        }
    }

    #[test]
    fn empty_input_gives_no_chunks() {
        assert!(pack_lines("", 100).is_empty());
        assert!(pack_lines("\n\n  \n", 100).is_empty());
    }
}
