//! Helpers shared by the compression strategies

use std::collections::HashSet;

use tracing::debug;

use crate::context::estimator::TokenCounter;
use crate::llm::{Message, ModelId};

/// A transcript split into system and non-system messages
pub(crate) struct Partitioned {
    pub system: Vec<Message>,
    pub rest: Vec<Message>,
    pub system_tokens: usize,
}

impl Partitioned {
    /// Tokens left for non-system messages under `token_limit`
    pub fn available(&self, token_limit: usize) -> usize {
        token_limit.saturating_sub(self.system_tokens)
    }
}

pub(crate) fn split_system(
    messages: Vec<Message>,
    counter: &TokenCounter,
    model: &ModelId,
) -> Partitioned {
    let (system, rest): (Vec<_>, Vec<_>) = messages.into_iter().partition(Message::is_system);
    let system_tokens = counter.count_tokens(&system, model);
    Partitioned {
        system,
        rest,
        system_tokens,
    }
}

/// Merge system messages back with the survivors in `sequence_index` order
///
/// Stable, and system messages win ties, so transcripts whose system prompt
/// leads the conversation get it prepended.
pub(crate) fn reassemble(system: Vec<Message>, kept: Vec<Message>) -> Vec<Message> {
    let mut merged = Vec::with_capacity(system.len() + kept.len());
    let mut system = system.into_iter().peekable();
    let mut kept = kept.into_iter().peekable();

    loop {
        let take_system = match (system.peek(), kept.peek()) {
            (Some(s), Some(k)) => s.sequence_index <= k.sequence_index,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_system { system.next() } else { kept.next() };
        merged.extend(next);
    }

    merged
}

/// Keep the newest messages whose running total fits `available`
///
/// Stops at the first message that does not fit; everything older is
/// dropped. Returns survivors in their original order.
pub(crate) fn keep_newest(
    messages: Vec<Message>,
    available: usize,
    counter: &TokenCounter,
    model: &ModelId,
) -> Vec<Message> {
    let mut kept = Vec::new();
    let mut running = 0usize;

    for message in messages.into_iter().rev() {
        let cost = counter.count_message(&message, model);
        if running + cost > available {
            break;
        }
        running += cost;
        kept.push(message);
    }

    kept.reverse();
    kept
}

/// Tool call ids requested and answered in a transcript before compression
///
/// Compression may drop one half of a call/result pair. `repair` removes the
/// other half so providers never see a result without its call or a call
/// without its result. Pairs that were already broken in the input are left
/// alone.
pub(crate) struct ToolPairing {
    requested: HashSet<String>,
    answered: HashSet<String>,
}

impl ToolPairing {
    pub fn of(messages: &[Message]) -> Self {
        Self {
            requested: requested_call_ids(messages),
            answered: answered_call_ids(messages),
        }
    }

    pub fn repair(&self, kept: Vec<Message>) -> Vec<Message> {
        let kept = drop_orphaned_results(kept, &self.requested);
        drop_unanswered_calls(kept, &self.answered)
    }
}

/// Tool call ids requested anywhere in `messages`
fn requested_call_ids(messages: &[Message]) -> HashSet<String> {
    messages
        .iter()
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .map(|c| c.id.clone())
        .collect()
}

/// Tool call ids that have a result in `messages`
fn answered_call_ids(messages: &[Message]) -> HashSet<String> {
    messages
        .iter()
        .filter(|m| m.is_tool_result())
        .filter_map(|m| m.tool_call_id.clone())
        .collect()
}

/// Drop tool results whose requesting call was removed by compression
fn drop_orphaned_results(kept: Vec<Message>, requested: &HashSet<String>) -> Vec<Message> {
    let surviving = requested_call_ids(&kept);
    kept.into_iter()
        .filter(|m| match (&m.tool_call_id, m.is_tool_result()) {
            (Some(id), true) => surviving.contains(id) || !requested.contains(id),
            _ => true,
        })
        .collect()
}

/// Strip tool calls whose result was removed by compression
///
/// An assistant turn left with neither calls nor text is dropped.
fn drop_unanswered_calls(kept: Vec<Message>, answered: &HashSet<String>) -> Vec<Message> {
    let surviving = answered_call_ids(&kept);
    kept.into_iter()
        .filter_map(|mut message| {
            let Some(calls) = message.tool_calls.take() else {
                return Some(message);
            };
            let (calls, lost): (Vec<_>, Vec<_>) = calls
                .into_iter()
                .partition(|c| surviving.contains(&c.id) || !answered.contains(&c.id));
            if lost.is_empty() {
                message.tool_calls = Some(calls);
                return Some(message);
            }

            debug!(
                sequence_index = message.sequence_index,
                stripped = lost.len(),
                "Removed tool calls whose results were dropped"
            );
            if !calls.is_empty() {
                message.tool_calls = Some(calls);
            } else if message.content.trim().is_empty() {
                return None;
            }
            Some(message)
        })
        .collect()
}

/// Largest char boundary in `s` not after `index`
pub(crate) fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
