pub mod claude;
pub mod ir;

pub use claude::{apply_thinking_to_ir, ensure_claude_max_tokens, ThinkingDirective};
pub use ir::{ChatMessage, ChatRole, ThinkingOptions, UnifiedChatRequest};
