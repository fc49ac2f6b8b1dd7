//! Token estimation.
//!
//! A fixed deterministic approximation: one token per four characters of
//! content, rounded down. This is a heuristic, not a tokenizer — it keeps
//! truncation reproducible without shipping model vocabularies, and it is
//! accurate enough for budget enforcement on English text.

use hearth_core::context::Context;

/// Estimate the token count of a string (length ÷ 4, floor).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Estimate the total cost of a context: system prompt plus every message.
pub fn estimate_context_tokens(context: &Context) -> usize {
    let system = context
        .system_prompt
        .as_deref()
        .map(estimate_tokens)
        .unwrap_or(0);
    let messages: usize = context
        .messages
        .iter()
        .map(|m| estimate_tokens(&m.content))
        .sum();
    system + messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::message::Role;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn rounds_down() {
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefg"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn hundred_chars_is_twenty_five() {
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn context_sums_system_and_messages() {
        let mut ctx = Context::with_system("12345678"); // 2 tokens
        ctx.add_message(Role::User, "abcd"); // 1 token
        ctx.add_message(Role::Assistant, "abcdefgh"); // 2 tokens
        assert_eq!(estimate_context_tokens(&ctx), 5);
    }

    #[test]
    fn context_without_system_counts_messages_only() {
        let mut ctx = Context::default();
        ctx.add_message(Role::User, "abcd");
        assert_eq!(estimate_context_tokens(&ctx), 1);
    }
}
