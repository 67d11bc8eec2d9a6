//! Incremental evaluation of a growing text stream.
//!
//! One [`StreamingEvaluator`] serves one live conversation turn. Chunks
//! accumulate in a buffer; a trigger predicate decides per chunk whether
//! the whole buffer is worth a full evaluation, so the stream is never
//! re-submitted wholesale on every token.
//!
//! Chunks between trigger points are not individually evaluated. That gap
//! is a deliberate latency/safety tradeoff and must not be "fixed"
//! casually; see DESIGN.md.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;

use palisade_core::policy::{EvaluationOrigin, PolicyScope};
use palisade_core::result::EvaluationResult;

use crate::error::{StreamingError, StreamingResult};
use crate::evaluator::EvaluatorCore;

/// Buffer length (in characters) beyond which evaluation triggers.
pub const TRIGGER_BUFFER_CHARS: usize = 300;

/// Every n-th chunk forces an evaluation regardless of buffer content.
pub const TRIGGER_CHUNK_INTERVAL: u64 = 10;

/// Characters of buffer tail retained after a safe evaluation, preserving
/// short-range context across the trigger boundary.
pub const RETAINED_TAIL_CHARS: usize = 50;

/// A sentence-ending run of punctuation, allowing trailing whitespace.
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s*$").expect("Invalid sentence-end pattern"));

#[derive(Debug, Default)]
struct StreamState {
    buffer: String,
    chunk_count: u64,
    has_violations: bool,
    disposed: bool,
}

/// Stateful per-stream evaluator.
///
/// Internal state sits behind an async mutex: chunk delivery, `reset`, and
/// `dispose` may arrive from different tasks, and the guard is held across
/// the evaluation await so a reset cannot interleave with a trim.
pub struct StreamingEvaluator {
    core: Arc<EvaluatorCore>,
    state: Mutex<StreamState>,
}

impl std::fmt::Debug for StreamingEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingEvaluator").finish_non_exhaustive()
    }
}

impl StreamingEvaluator {
    pub(crate) fn new(core: Arc<EvaluatorCore>) -> Self {
        Self {
            core,
            state: Mutex::new(StreamState::default()),
        }
    }

    /// Feeds one chunk into the stream.
    ///
    /// Returns a safe result immediately when nothing triggers; when the
    /// trigger predicate fires, the whole accumulated buffer is evaluated
    /// against the output policy. An unsafe verdict leaves the buffer
    /// intact and latches `has_violations`; the stream owner is expected
    /// to terminate, but that is not enforced here.
    pub async fn evaluate_chunk(&self, chunk: &str) -> StreamingResult<EvaluationResult> {
        let mut state = self.state.lock().await;
        if state.disposed {
            return Err(StreamingError::Disposed);
        }
        if !self.core.is_enabled() {
            return Ok(EvaluationResult::safe(self.core.base_metadata()));
        }
        if chunk.trim().is_empty() {
            // Whitespace carries no signal: no counter bump, no append.
            return Ok(EvaluationResult::safe(self.core.base_metadata()));
        }

        state.chunk_count += 1;
        state.buffer.push_str(chunk);

        if !should_trigger(&state.buffer, state.chunk_count) {
            return Ok(EvaluationResult::safe(self.core.base_metadata()));
        }

        let buffer_chars = state.buffer.chars().count();
        let mut result = self
            .core
            .evaluate(&state.buffer, PolicyScope::Output, EvaluationOrigin::Streaming)
            .await;
        result.metadata.additional_data.insert(
            "evaluation_type".to_string(),
            serde_json::json!("streaming"),
        );
        result.metadata.additional_data.insert(
            "chunk_number".to_string(),
            serde_json::json!(state.chunk_count),
        );
        result
            .metadata
            .additional_data
            .insert("buffer_length".to_string(), serde_json::json!(buffer_chars));

        if result.is_safe {
            state.buffer = tail_chars(&state.buffer, RETAINED_TAIL_CHARS);
        } else {
            state.has_violations = true;
            tracing::warn!(
                chunk_number = state.chunk_count,
                risk_score = result.risk_score,
                "streaming content violated policy"
            );
        }
        Ok(result)
    }

    /// Clears the buffer, chunk counter, and violation latch. Leaves the
    /// disposed flag alone.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.buffer.clear();
        state.chunk_count = 0;
        state.has_violations = false;
    }

    /// Marks the evaluator disposed and clears its state. Idempotent.
    /// Subsequent `evaluate_chunk` calls fail; accessors stay readable.
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        state.buffer.clear();
        state.chunk_count = 0;
        state.has_violations = false;
        state.disposed = true;
    }

    /// Returns the currently accumulated buffer content.
    pub async fn accumulated_content(&self) -> String {
        self.state.lock().await.buffer.clone()
    }

    /// Returns how many non-empty chunks have been processed.
    pub async fn processed_chunk_count(&self) -> u64 {
        self.state.lock().await.chunk_count
    }

    /// Returns true once any triggered evaluation came back unsafe.
    /// Latched until [`reset`](Self::reset).
    pub async fn has_violations(&self) -> bool {
        self.state.lock().await.has_violations
    }

    /// Returns true after [`dispose`](Self::dispose).
    pub async fn is_disposed(&self) -> bool {
        self.state.lock().await.disposed
    }
}

/// The per-chunk trigger predicate, applied to the post-append buffer.
fn should_trigger(buffer: &str, chunk_count: u64) -> bool {
    buffer.chars().count() > TRIGGER_BUFFER_CHARS
        || SENTENCE_END.is_match(buffer)
        || buffer.contains("\n\n")
        || chunk_count % TRIGGER_CHUNK_INTERVAL == 0
}

/// Returns the last `n` characters of `s`, respecting UTF-8 boundaries.
fn tail_chars(s: &str, n: usize) -> String {
    let total = s.chars().count();
    if total <= n {
        return s.to_string();
    }
    s.chars().skip(total - n).collect()
}
