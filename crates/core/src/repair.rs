use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex"));
static OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*").expect("opening fence regex"));

/// Best-effort cleanup of free-text model output into a JSON candidate.
///
/// Strips fenced code markers bounding the payload, removes trailing commas
/// before a closing bracket, and closes an unterminated trailing object or
/// array when detectable. This is a text transform, not a parser: it never
/// fails, and unrepairable input simply fails the downstream parse.
pub fn repair(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    if let Some(m) = OPENING_FENCE.find(&text) {
        text = text[m.end()..].to_string();
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped.to_string();
    }
    let mut text = text.trim().to_string();
    text = TRAILING_COMMA.replace_all(&text, "$1").into_owned();
    if text.starts_with('{') || text.starts_with('[') {
        close_open_brackets(&mut text);
    }
    text
}

/// Appends the closers needed to balance brackets opened outside of string
/// literals, closing an unterminated trailing string first.
fn close_open_brackets(text: &mut String) {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack.push(ch),
            '}' if !in_string => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' if !in_string => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    if stack.is_empty() && !in_string {
        return;
    }
    if in_string {
        text.push('"');
    }
    while let Some(open) = stack.pop() {
        text.push(if open == '{' { '}' } else { ']' });
    }
}
