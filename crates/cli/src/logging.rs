//! Console reporting for the CLI. Everything goes to stderr with a `[synth]`
//! prefix so piped stdout stays machine-readable.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Turn on verbose output from either the CLI flag or `SYNTH_VERBOSE`.
pub fn init(flag: bool) {
    VERBOSE.store(flag || env_verbose(), Ordering::Relaxed);
    verbose("verbose output enabled");
}

pub fn info(message: impl AsRef<str>) {
    emit(None, message.as_ref());
}

pub fn stage(name: &str, message: impl AsRef<str>) {
    emit(Some(name), message.as_ref());
}

pub fn verbose(message: impl AsRef<str>) {
    if VERBOSE.load(Ordering::Relaxed) {
        emit(Some("verbose"), message.as_ref());
    }
}

fn emit(tag: Option<&str>, message: &str) {
    match tag {
        Some(tag) => eprintln!("[synth::{tag}] {message}"),
        None => eprintln!("[synth] {message}"),
    }
}

fn env_verbose() -> bool {
    env::var("SYNTH_VERBOSE")
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(raw: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|accepted| raw.trim().eq_ignore_ascii_case(accepted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values_are_case_and_whitespace_insensitive() {
        assert!(is_truthy(" TRUE "));
        assert!(is_truthy("yes"));
        assert!(is_truthy("1"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("verbose"));
        assert!(!is_truthy(""));
    }
}
