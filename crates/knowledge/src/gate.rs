//! Gate evaluator: a per-source yes/no relevance decision.
//!
//! The verdict parser is layered so each layer can be exercised on its own:
//! 1. strip one symmetric layer of quotes, backticks or a code fence
//! 2. structured parse of `{"include": "yes"|"no"}`
//! 3. permissive `include: yes` match on the text
//! 4. otherwise the decision fails closed
//!
//! A failed model call is folded into a failed decision; gating never
//! returns an error and never aborts sibling evaluations.

use regex::Regex;
use scout_core::SourceConfig;
use scout_llm::{ChatMessage, ChatRequest, LlmClient};
use scout_prompt::{PromptSet, GATE_SOURCE};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Which parser layer produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Structured,
    RegexFallback,
    Failed,
}

/// Inclusion decision for one (query, source) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub source_id: String,
    pub include: bool,
    /// Model text as received, or the failure description
    pub raw: String,
    pub outcome: GateOutcome,
}

impl GateDecision {
    /// Fail-closed decision.
    pub fn failed(source_id: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            include: false,
            raw: raw.into(),
            outcome: GateOutcome::Failed,
        }
    }

    /// Build a decision from model text.
    pub fn from_response(source_id: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let (include, outcome) = parse_verdict(&raw);
        Self {
            source_id: source_id.into(),
            include,
            raw,
            outcome,
        }
    }
}

/// Run all parser layers over model text.
pub fn parse_verdict(raw: &str) -> (bool, GateOutcome) {
    let text = strip_wrapping(raw);

    if let Some(include) = parse_structured(text) {
        return (include, GateOutcome::Structured);
    }

    if matches_affirmative(text) {
        return (true, GateOutcome::RegexFallback);
    }

    (false, GateOutcome::Failed)
}

/// Remove a single symmetric layer of quote characters or a code fence.
pub fn strip_wrapping(raw: &str) -> &str {
    let text = raw.trim();

    if text.len() >= 6 && text.starts_with("```") && text.ends_with("```") {
        let inner = &text[3..text.len() - 3];
        // Drop an info string such as ```json
        let inner = match inner.find('\n') {
            Some(pos) if !inner[..pos].trim_start().starts_with('{') => &inner[pos + 1..],
            _ => inner,
        };
        return inner.trim();
    }

    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && matches!(first, b'"' | b'\'' | b'`') {
            return text[1..text.len() - 1].trim();
        }
    }

    text
}

/// Structured layer: a JSON object whose `include` key is "yes" or "no".
///
/// Key and value are matched case-insensitively. Anything else is `None`.
pub fn parse_structured(text: &str) -> Option<bool> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;

    let verdict = object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("include"))
        .and_then(|(_, v)| v.as_str())?;

    match verdict.trim().to_ascii_lowercase().as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

fn affirmative_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?i)["'`]?\binclude\b["'`]?\s*[:=]\s*["'`]?yes\b"#).ok())
        .as_ref()
}

/// Fallback layer: an `include: yes` signal anywhere in the text.
pub fn matches_affirmative(text: &str) -> bool {
    affirmative_pattern().is_some_and(|re| re.is_match(text))
}

/// Asks the gate model whether a source should be queried.
#[derive(Clone)]
pub struct GateEvaluator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompts: Arc<PromptSet>,
    timeout: Duration,
}

impl GateEvaluator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompts: Arc<PromptSet>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompts,
            timeout,
        }
    }

    /// Decide whether `source` should be queried for `query`.
    pub async fn gate(&self, source: &SourceConfig, query: &str) -> GateDecision {
        if query.trim().is_empty() {
            tracing::warn!(source = %source.id, "Gate called with empty query");
            return GateDecision::failed(&source.id, "empty query");
        }

        let prompt = match self.prompts.render_with(
            GATE_SOURCE,
            &[
                ("source", source.id.as_str()),
                ("description", source.description.as_str()),
                ("query", query),
            ],
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                // Templates are probed at startup, so this is a defect rather than a model failure
                tracing::error!(source = %source.id, error = %e, "Gate prompt failed to render");
                return GateDecision::failed(&source.id, e.to_string());
            }
        };

        let request = ChatRequest::new(&self.model, vec![ChatMessage::user(prompt)])
            .with_temperature(0.0)
            .with_max_tokens(20);

        let response = match tokio::time::timeout(self.timeout, self.client.chat(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(source = %source.id, error = %e, "Gate model call failed, excluding source");
                return GateDecision::failed(&source.id, e.to_string());
            }
            Err(_) => {
                tracing::warn!(source = %source.id, timeout_ms = self.timeout.as_millis() as u64, "Gate model call timed out, excluding source");
                return GateDecision::failed(&source.id, "gate call timed out");
            }
        };

        let decision = GateDecision::from_response(&source.id, response.message.content);

        tracing::debug!(
            source = %decision.source_id,
            include = decision.include,
            outcome = ?decision.outcome,
            "Gate decision"
        );

        decision
    }
}
