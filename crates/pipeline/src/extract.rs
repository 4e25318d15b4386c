//! Bounded-retry extraction against a [`TextTransformer`].
//!
//! Every stage that talks to a model goes through [`RetryingExtractor`]: it
//! truncates oversized input, renders the stage prompt, calls the transformer,
//! and hands the raw response to a stage-supplied parser. Extraction never
//! fails the pipeline; once the attempts are exhausted a degraded fallback
//! value is produced instead.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use synth_llm::{LlmRequest, TextTransformer};

/// Visible marker appended whenever input is cut to fit a stage limit.
pub const TRUNCATION_MARKER: &str = "\n\n[... text truncated due to length ...]";

/// Per-stage input limits. `retry_limit`, when tighter than `limit`, kicks in
/// from the second attempt onward so a retry sends less text than the attempt
/// that just failed.
#[derive(Debug, Clone, Copy)]
pub struct TruncationPolicy {
    pub limit: usize,
    pub retry_limit: Option<usize>,
}

impl TruncationPolicy {
    pub fn fixed(limit: usize) -> Self {
        Self {
            limit,
            retry_limit: None,
        }
    }

    pub fn shrinking(limit: usize, retry_limit: usize) -> Self {
        Self {
            limit,
            retry_limit: Some(retry_limit),
        }
    }

    fn limit_for_attempt(&self, attempt: u32) -> usize {
        if attempt == 1 {
            self.limit
        } else {
            self.retry_limit.unwrap_or(self.limit).min(self.limit)
        }
    }
}

/// Cut `text` at a char boundary at or below `limit` bytes and append the
/// truncation marker. Input at or under the limit passes through untouched.
pub fn truncate_with_marker(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
    out.push_str(&text[..cut]);
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Outcome of one extraction: either a parsed value or the stage's fallback.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    pub value: T,
    pub degraded: bool,
    pub attempts: u32,
}

pub struct RetryingExtractor {
    transformer: Arc<dyn TextTransformer>,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryingExtractor {
    pub fn new(transformer: Arc<dyn TextTransformer>, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            transformer,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run up to `max_attempts` transform calls. `parse` sees the raw model
    /// text; returning `None` counts the attempt as failed. After the last
    /// attempt `fallback` receives the last error description and its value
    /// is returned with `degraded = true`.
    pub fn extract<T>(
        &self,
        input: &str,
        policy: TruncationPolicy,
        render: impl Fn(&str) -> String,
        parse: impl Fn(&str) -> Option<T>,
        fallback: impl FnOnce(&str) -> T,
    ) -> Extracted<T> {
        let mut last_error = String::from("no attempts made");
        for attempt in 1..=self.max_attempts {
            let bounded = truncate_with_marker(input, policy.limit_for_attempt(attempt));
            let prompt = render(&bounded);
            match self.transformer.transform(&LlmRequest::user(prompt)) {
                Ok(resp) => {
                    if let Some(value) = parse(&resp.content) {
                        return Extracted {
                            value,
                            degraded: false,
                            attempts: attempt,
                        };
                    }
                    last_error = format!("unparseable response ({} chars)", resp.content.len());
                    tracing::warn!(attempt, max = self.max_attempts, "extraction parse failed");
                }
                Err(err) => {
                    last_error = err.to_string();
                    tracing::warn!(attempt, max = self.max_attempts, error = %last_error, "transform call failed");
                }
            }
            if attempt < self.max_attempts && !self.backoff.is_zero() {
                thread::sleep(self.backoff);
            }
        }
        Extracted {
            value: fallback(&last_error),
            degraded: true,
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use synth_llm::LlmResponse;

    struct Scripted {
        calls: AtomicU32,
        fail: bool,
    }

    impl TextTransformer for Scripted {
        fn transform(&self, req: &LlmRequest) -> anyhow::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("upstream unavailable"));
            }
            Ok(LlmResponse::text(format!("echo:{}", req.user.len())))
        }
    }

    #[test]
    fn success_short_circuits() {
        let stub = Arc::new(Scripted {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let extractor = RetryingExtractor::new(stub.clone(), 3, Duration::ZERO);
        let out = extractor.extract(
            "hello",
            TruncationPolicy::fixed(100),
            |s| s.to_string(),
            |raw| Some(raw.to_string()),
            |_| String::from("fallback"),
        );
        assert!(!out.degraded);
        assert_eq!(out.attempts, 1);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exhaustion_yields_fallback_after_max_attempts() {
        let stub = Arc::new(Scripted {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let extractor = RetryingExtractor::new(stub.clone(), 3, Duration::ZERO);
        let out = extractor.extract(
            "hello",
            TruncationPolicy::fixed(100),
            |s| s.to_string(),
            |_| None::<String>,
            |err| format!("degraded: {err}"),
        );
        assert!(out.degraded);
        assert_eq!(out.attempts, 3);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        assert!(out.value.contains("upstream unavailable"));
    }

    #[test]
    fn retry_uses_tighter_limit() {
        struct LenRecorder {
            lens: std::sync::Mutex<Vec<usize>>,
        }
        impl TextTransformer for LenRecorder {
            fn transform(&self, req: &LlmRequest) -> anyhow::Result<LlmResponse> {
                self.lens.lock().unwrap().push(req.user.len());
                Ok(LlmResponse::text(""))
            }
        }
        let stub = Arc::new(LenRecorder {
            lens: std::sync::Mutex::new(Vec::new()),
        });
        let extractor = RetryingExtractor::new(stub.clone(), 2, Duration::ZERO);
        let input = "x".repeat(50);
        extractor.extract(
            &input,
            TruncationPolicy::shrinking(40, 20),
            |s| s.to_string(),
            |_| None::<()>,
            |_| (),
        );
        let lens = stub.lens.lock().unwrap();
        assert_eq!(lens.len(), 2);
        assert!(lens[1] < lens[0]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo wörld".repeat(10);
        let out = truncate_with_marker(&text, 13);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.len() <= 13 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn short_input_passes_through() {
        assert_eq!(truncate_with_marker("short", 100), "short");
    }
}
