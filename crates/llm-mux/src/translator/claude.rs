//! Thinking-mode rewrites for Claude request bodies and the unified IR.
//!
//! Claude requires `max_tokens` to leave room for both the reasoning budget
//! and the visible answer; `ensure_claude_max_tokens` enforces that. All
//! rewrites are idempotent and leave caller-provided fields untouched.

use serde_json::{json, Value};

use super::ir::{ThinkingOptions, UnifiedChatRequest};
use crate::thinking::{self, parse_thinking_suffix};

/// Output headroom added on top of the thinking budget when the model's
/// max completion tokens are unknown.
pub const RESPONSE_BUFFER_TOKENS: i64 = 4000;

/// Thinking configuration to inject into a provider request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingDirective {
    pub enabled: bool,
    pub budget_tokens: i64,
}

impl ThinkingDirective {
    /// Derives a directive from a model name suffix, resolving the budget
    /// through the registry. Returns `None` for non-thinking names or when
    /// resolution yields no positive budget.
    pub fn from_model(model: &str) -> Option<Self> {
        let (_, level, is_thinking) = parse_thinking_suffix(model);
        if !is_thinking {
            return None;
        }

        let (budget, _) = thinking::thinking_budget(model, level, 0);
        if budget <= 0 {
            return None;
        }

        Some(Self {
            enabled: true,
            budget_tokens: budget,
        })
    }

    /// Sets `thinking.type`/`thinking.budget_tokens` on a Claude body. A
    /// body that already carries a `thinking` object is returned unchanged.
    pub fn apply_to_claude(&self, mut body: Value) -> Value {
        if !self.enabled {
            return body;
        }
        if body.get("thinking").is_some() {
            return body;
        }

        if let Some(obj) = body.as_object_mut() {
            obj.insert(
                "thinking".to_string(),
                json!({"type": "enabled", "budget_tokens": self.budget_tokens}),
            );
        }
        body
    }
}

/// Raises `max_tokens` so generation has room for both reasoning and the
/// answer. A no-op unless the body has thinking enabled with a positive
/// budget.
pub fn ensure_claude_max_tokens(model: &str, mut body: Value) -> Value {
    let thinking_type = body.pointer("/thinking/type").and_then(Value::as_str);
    if thinking_type != Some("enabled") {
        return body;
    }

    let budget_tokens = body
        .pointer("/thinking/budget_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if budget_tokens <= 0 {
        return body;
    }

    let max_tokens = body.get("max_tokens").and_then(Value::as_i64).unwrap_or(0);
    let required = required_max_tokens(model, budget_tokens);

    if max_tokens < required {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("max_tokens".to_string(), json!(required));
        }
    }
    body
}

/// Applies suffix-derived thinking to the unified request: populates
/// `thinking` and bumps `max_tokens` to the required output budget. A
/// request where the caller already enabled thoughts is left alone.
pub fn apply_thinking_to_ir(model: &str, req: &mut UnifiedChatRequest) {
    if req.thinking.is_some_and(|t| t.include_thoughts) {
        return;
    }

    let Some(directive) = ThinkingDirective::from_model(model) else {
        return;
    };

    req.thinking = Some(ThinkingOptions {
        include_thoughts: true,
        thinking_budget: Some(directive.budget_tokens as i32),
    });

    let required = required_max_tokens(model, directive.budget_tokens);
    if req.max_tokens.map_or(true, |max| max < required) {
        req.max_tokens = Some(required);
    }
}

fn required_max_tokens(model: &str, budget_tokens: i64) -> i64 {
    let max_completion = thinking::lookup_model(model)
        .map(|info| info.max_completion_tokens)
        .unwrap_or(0);

    if max_completion > 0 {
        max_completion
    } else {
        budget_tokens + RESPONSE_BUFFER_TOKENS
    }
}
