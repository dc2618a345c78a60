//! Thinking (extended-reasoning) capability resolution.
//!
//! Virtual model names carry a `-thinking[-<level>]` suffix; the effective
//! budget is resolved from the registry record with a three-tier priority
//! chain: user-specified budget, suffix level, then registry default.

use serde::{Deserialize, Serialize};

use crate::registry::{ModelInfo, ModelRegistry, ThinkingBudgets, ThinkingSupport};

/// Fallback budget when a thinking model carries no usable metadata.
pub const DEFAULT_THINKING_BUDGET: i64 = 1024;

/// Fallback level-to-budget table used when a model's own table is all-zero
/// or absent. Matches common provider defaults.
pub const DEFAULT_THINKING_BUDGETS: ThinkingBudgets = ThinkingBudgets {
    low: 1024,
    medium: 8192,
    high: 24576,
    max: 32768,
};

/// Symbolic thinking level; "unset" is represented as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Low,
    Medium,
    High,
    Max,
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Low => "low",
            ThinkingLevel::Medium => "medium",
            ThinkingLevel::High => "high",
            ThinkingLevel::Max => "max",
        }
    }
}

impl std::fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracts the thinking level from a model name suffix.
///
/// Returns `(base_name, level, is_thinking)`. Matching is case-sensitive
/// and first-match-wins; a bare `-thinking` suffix defaults to `Max`.
pub fn parse_thinking_suffix(model: &str) -> (&str, Option<ThinkingLevel>, bool) {
    const SUFFIXES: [(&str, ThinkingLevel); 5] = [
        ("-thinking-max", ThinkingLevel::Max),
        ("-thinking-high", ThinkingLevel::High),
        ("-thinking-medium", ThinkingLevel::Medium),
        ("-thinking-low", ThinkingLevel::Low),
        ("-thinking", ThinkingLevel::Max),
    ];

    for (suffix, level) in SUFFIXES {
        if let Some(base) = model.strip_suffix(suffix) {
            return (base, Some(level), true);
        }
    }
    (model, None, false)
}

/// Capability lookup for a possibly-suffixed model name: exact match first,
/// then the suffix-stripped base name. A directly-registered virtual name
/// therefore wins over its base record.
pub(crate) fn lookup_model(model: &str) -> Option<&'static ModelInfo> {
    let registry = ModelRegistry::global();
    registry.get_model_info(model).or_else(|| {
        let (base, _, is_thinking) = parse_thinking_suffix(model);
        if is_thinking {
            registry.get_model_info(base)
        } else {
            None
        }
    })
}

/// Whether the model has thinking capability according to registry metadata.
pub fn model_supports_thinking(model: &str) -> bool {
    if model.is_empty() {
        return false;
    }
    lookup_model(model).is_some_and(|info| info.thinking.is_some())
}

/// Minimum thinking budget for a model; 0 when the model doesn't think.
pub fn model_thinking_min(model: &str) -> i64 {
    if model.is_empty() {
        return 0;
    }
    lookup_model(model)
        .and_then(|info| info.thinking.as_ref())
        .map(|ts| ts.min)
        .unwrap_or(0)
}

/// Default budget for auto-enabling thinking on a model: the registry `min`
/// when positive, [`DEFAULT_THINKING_BUDGET`] otherwise.
pub fn default_thinking_budget(model: &str) -> i64 {
    let min = model_thinking_min(model);
    if min > 0 {
        min
    } else {
        DEFAULT_THINKING_BUDGET
    }
}

/// Default thinking configuration to auto-apply for a model. Returns
/// `Some((budget, include_thoughts))` when the model supports thinking.
pub fn auto_applied_thinking(model: &str) -> Option<(i64, bool)> {
    if model_supports_thinking(model) {
        Some((default_thinking_budget(model), true))
    } else {
        None
    }
}

fn effective_budgets(ts: &ThinkingSupport) -> ThinkingBudgets {
    if ts.budgets.is_empty() {
        DEFAULT_THINKING_BUDGETS
    } else {
        ts.budgets
    }
}

/// Resolves the thinking budget for a model.
///
/// Priority: a positive `user_budget` wins verbatim, then the suffix level
/// looked up in the model's budget table (falling back to
/// [`DEFAULT_THINKING_BUDGETS`] when the table is empty), then the registry
/// default level, then the registry `min`. The selected budget is clamped
/// into `[min, max]` where those bounds are nonzero.
///
/// Returns `(budget, is_thinking)`. A model without a registry record or
/// without thinking metadata resolves to `(0, false)`.
pub fn thinking_budget(
    model: &str,
    suffix_level: Option<ThinkingLevel>,
    user_budget: i64,
) -> (i64, bool) {
    let Some(ts) = lookup_model(model).and_then(|info| info.thinking.as_ref()) else {
        return (0, false);
    };

    let mut budget = if user_budget > 0 {
        user_budget
    } else if let Some(level) = suffix_level {
        effective_budgets(ts).for_level(level)
    } else if let Some(level) = ts.default_level {
        effective_budgets(ts).for_level(level)
    } else {
        ts.min
    };

    if budget < ts.min && ts.min > 0 {
        budget = ts.min;
    }
    if budget > ts.max && ts.max > 0 {
        budget = ts.max;
    }

    (budget, budget > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_round_trip_for_every_level() {
        for (level, suffix) in [
            (ThinkingLevel::Low, "-thinking-low"),
            (ThinkingLevel::Medium, "-thinking-medium"),
            (ThinkingLevel::High, "-thinking-high"),
            (ThinkingLevel::Max, "-thinking-max"),
        ] {
            let name = format!("claude-sonnet-4-5{suffix}");
            let (base, parsed, is_thinking) = parse_thinking_suffix(&name);
            assert_eq!(base, "claude-sonnet-4-5");
            assert_eq!(parsed, Some(level));
            assert!(is_thinking);
        }
    }

    #[test]
    fn bare_thinking_suffix_defaults_to_max() {
        let (base, level, is_thinking) = parse_thinking_suffix("gemini-2.5-pro-thinking");
        assert_eq!(base, "gemini-2.5-pro");
        assert_eq!(level, Some(ThinkingLevel::Max));
        assert!(is_thinking);
    }

    #[test]
    fn non_suffixed_names_pass_through() {
        for name in ["gemini-2.0-flash", "gpt-4o", "claude-thinking-ultra", ""] {
            let (base, level, is_thinking) = parse_thinking_suffix(name);
            assert_eq!(base, name);
            assert_eq!(level, None);
            assert!(!is_thinking);
        }
    }

    #[test]
    fn suffix_matching_is_case_sensitive() {
        let (base, level, is_thinking) = parse_thinking_suffix("model-Thinking-high");
        assert_eq!(base, "model-Thinking-high");
        assert_eq!(level, None);
        assert!(!is_thinking);
    }

    #[test]
    fn suffix_level_selects_registry_budget() {
        // claude-sonnet-4-5 carries {min:1024, max:32768, budgets:{..., high:24576}}.
        let (budget, is_thinking) =
            thinking_budget("claude-sonnet-4-5-thinking-high", Some(ThinkingLevel::High), 0);
        assert_eq!(budget, 24576);
        assert!(is_thinking);
    }

    #[test]
    fn user_budget_wins_over_suffix_level() {
        let (budget, is_thinking) =
            thinking_budget("claude-sonnet-4-5", Some(ThinkingLevel::Low), 9000);
        assert_eq!(budget, 9000);
        assert!(is_thinking);
    }

    #[test]
    fn user_budget_is_clamped_to_max() {
        let (budget, is_thinking) =
            thinking_budget("claude-sonnet-4-5", Some(ThinkingLevel::High), 50000);
        assert_eq!(budget, 32768);
        assert!(is_thinking);
    }

    #[test]
    fn small_user_budget_is_raised_to_min() {
        let (budget, _) = thinking_budget("claude-sonnet-4-5", None, 1);
        assert_eq!(budget, 1024);
    }

    #[test]
    fn clamp_is_idempotent() {
        let (first, _) = thinking_budget("claude-sonnet-4-5", None, 50000);
        let (second, _) = thinking_budget("claude-sonnet-4-5", None, first);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_budget_table_falls_back_to_defaults() {
        // claude-3-7-sonnet defines no budgets table.
        let (budget, is_thinking) =
            thinking_budget("claude-3-7-sonnet", Some(ThinkingLevel::Medium), 0);
        assert_eq!(budget, DEFAULT_THINKING_BUDGETS.medium);
        assert!(is_thinking);
    }

    #[test]
    fn default_level_applies_without_suffix() {
        // gemini-2.5-pro has default_level=high and no budgets table.
        let (budget, is_thinking) = thinking_budget("gemini-2.5-pro", None, 0);
        assert_eq!(budget, DEFAULT_THINKING_BUDGETS.high);
        assert!(is_thinking);
    }

    #[test]
    fn min_is_the_last_resort_default() {
        // claude-sonnet-4 (copilot) has neither default_level nor budgets;
        // resolution without a suffix falls back to min.
        let (budget, is_thinking) = thinking_budget("claude-sonnet-4", None, 0);
        assert_eq!(budget, 1024);
        assert!(is_thinking);
    }

    #[test]
    fn unknown_model_resolves_to_no_thinking() {
        let (budget, is_thinking) = thinking_budget("not-a-model", Some(ThinkingLevel::Max), 0);
        assert_eq!(budget, 0);
        assert!(!is_thinking);
    }

    #[test]
    fn non_thinking_model_resolves_to_no_thinking() {
        let (budget, is_thinking) = thinking_budget("gemini-2.0-flash", None, 4096);
        assert_eq!(budget, 0);
        assert!(!is_thinking);
    }

    #[test]
    fn virtual_name_falls_back_to_base_record() {
        assert!(model_supports_thinking("gemini-2.5-pro-thinking-low"));
        assert!(!model_supports_thinking("gemini-2.0-flash-thinking"));
    }

    #[test]
    fn auto_applied_thinking_uses_registry_min() {
        assert_eq!(auto_applied_thinking("gemini-2.5-pro"), Some((128, true)));
        assert_eq!(auto_applied_thinking("gpt-4o"), None);
    }

    #[test]
    fn default_budget_falls_back_when_min_is_zero() {
        // gemini-2.5-flash thinks but has min=0.
        assert_eq!(
            default_thinking_budget("gemini-2.5-flash"),
            DEFAULT_THINKING_BUDGET
        );
    }
}
