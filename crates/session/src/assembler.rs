//! Context truncation under a token budget.
//!
//! The system prompt is preserved unconditionally; messages are kept as the
//! longest chronological *suffix* whose estimated cost, together with the
//! prompt, fits the budget. If the system prompt alone exceeds the budget
//! the result carries zero messages but keeps the prompt — the prompt is
//! never truncated.

use crate::token::estimate_tokens;
use hearth_core::context::Context;
use hearth_core::message::Message;
use std::collections::VecDeque;
use tracing::debug;

/// Default token budget for an assembled prompt.
pub const DEFAULT_TOKEN_BUDGET: usize = 4000;

/// Produce a copy of `context` whose estimated cost fits within `budget`.
///
/// Walks messages newest-to-oldest, accumulating estimated cost, and stops
/// at the first message that would exceed the budget; everything older is
/// discarded. Retained messages keep their original chronological order.
pub fn fit_to_budget(context: &Context, budget: usize) -> Context {
    let mut fitted = Context {
        system_prompt: context.system_prompt.clone(),
        messages: Vec::new(),
        max_tokens: context.max_tokens,
        temperature: context.temperature,
    };

    let mut total = context
        .system_prompt
        .as_deref()
        .map(estimate_tokens)
        .unwrap_or(0);

    let mut kept: VecDeque<Message> = VecDeque::new();
    for message in context.messages.iter().rev() {
        let cost = estimate_tokens(&message.content);
        if total + cost > budget {
            break;
        }
        total += cost;
        kept.push_front(message.clone());
    }

    if kept.len() < context.messages.len() {
        debug!(
            kept = kept.len(),
            dropped = context.messages.len() - kept.len(),
            total_tokens = total,
            budget,
            "Context truncated to budget"
        );
    }

    fitted.messages = kept.into();
    fitted
}
