use crate::config::ContextConfig;

/// Tokens actually retained in the KV cache. A sliding window bounds the live cache
/// regardless of the nominal context length.
pub fn effective_kv_tokens(context: &ContextConfig) -> u64 {
    if context.sliding_window_enabled {
        context.context_tokens.min(context.sliding_window_tokens)
    } else {
        context.context_tokens
    }
}
