//! Token accounting for Gemini-shaped request payloads.
//!
//! Counting is observational: every failure path degrades to a count of 0
//! and nothing here ever propagates an error.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tiktoken_rs::CoreBPE;

/// Tokenizers keyed by normalized model family. Entries are never evicted;
/// construction happens at most once per key.
static TOKENIZER_CACHE: Lazy<RwLock<HashMap<String, Arc<CoreBPE>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// A content entry extracted from a Gemini request payload, reduced to its
/// textual parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiContent {
    pub role: String,
    pub texts: Vec<String>,
}

/// Counts tokens in a Gemini API request payload. Returns 0 on any error.
///
/// Both the native payload shape (`contents` at the root) and the wrapped
/// shape (`request.contents`) are accepted.
pub fn count_tokens_from_gemini_request(model: &str, payload: &[u8]) -> i64 {
    let Some(tokenizer) = get_or_create_tokenizer(model) else {
        return 0;
    };

    let contents = extract_contents_from_payload(payload);
    if contents.is_empty() {
        return 0;
    }

    contents
        .iter()
        .flat_map(|content| content.texts.iter())
        .map(|text| tokenizer.encode_with_special_tokens(text).len() as i64)
        .sum()
}

/// Number of distinct tokenizer families constructed so far.
pub fn tokenizer_cache_size() -> usize {
    TOKENIZER_CACHE.read().map(|cache| cache.len()).unwrap_or(0)
}

fn get_or_create_tokenizer(model: &str) -> Option<Arc<CoreBPE>> {
    let family = normalize_model_for_tokenizer(model);

    {
        let cache = TOKENIZER_CACHE.read().ok()?;
        if let Some(tokenizer) = cache.get(family) {
            return Some(tokenizer.clone());
        }
    }

    let mut cache = TOKENIZER_CACHE.write().ok()?;
    // Re-check after acquiring the write lock.
    if let Some(tokenizer) = cache.get(family) {
        return Some(tokenizer.clone());
    }

    let tokenizer = match build_tokenizer(family) {
        Ok(bpe) => Arc::new(bpe),
        Err(e) => {
            tracing::warn!("failed to construct tokenizer for {family}: {e}");
            return None;
        }
    };
    cache.insert(family.to_string(), tokenizer.clone());
    Some(tokenizer)
}

fn build_tokenizer(family: &str) -> anyhow::Result<CoreBPE> {
    match family {
        "gemini-1.0-pro" | "gemini-1.5-flash" => tiktoken_rs::cl100k_base(),
        _ => tiktoken_rs::o200k_base(),
    }
}

/// Maps model names to a tokenizer family. Containment matching runs in a
/// fixed order; a name matching an earlier arm never reaches a later one.
fn normalize_model_for_tokenizer(model: &str) -> &'static str {
    if contains_any(model, &["gemini-3", "gemini-2.5", "gemini-2.0"]) {
        "gemini-2.0-flash"
    } else if contains_any(model, &["gemini-1.5"]) {
        "gemini-1.5-flash"
    } else if contains_any(model, &["gemini-1.0", "gemini-pro"]) {
        "gemini-1.0-pro"
    } else {
        "gemini-2.0-flash"
    }
}

fn contains_any(s: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| s.contains(needle))
}

/// Extracts content entries from a Gemini request payload. The wrapped
/// shape is detected by the presence of `request.contents`.
pub fn extract_contents_from_payload(payload: &[u8]) -> Vec<GeminiContent> {
    let Ok(root) = serde_json::from_slice::<Value>(payload) else {
        return Vec::new();
    };

    let (contents, system_instruction) = if root.pointer("/request/contents").is_some() {
        (
            root.pointer("/request/contents"),
            root.pointer("/request/systemInstruction"),
        )
    } else {
        (root.get("contents"), root.get("systemInstruction"))
    };

    let mut out = Vec::new();

    if let Some(system) = system_instruction {
        if let Some(content) = parse_content(system, "user") {
            out.push(content);
        }
    }

    if let Some(items) = contents.and_then(Value::as_array) {
        for item in items {
            let role = item
                .get("role")
                .and_then(Value::as_str)
                .filter(|role| !role.is_empty())
                .unwrap_or("user");
            if let Some(content) = parse_content(item, role) {
                out.push(content);
            }
        }
    }

    out
}

/// Keeps only textual parts; a content with no text parts is dropped.
fn parse_content(value: &Value, role: &str) -> Option<GeminiContent> {
    let parts = value.get("parts")?.as_array()?;

    let texts: Vec<String> = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    if texts.is_empty() {
        return None;
    }

    Some(GeminiContent {
        role: role.to_string(),
        texts,
    })
}
