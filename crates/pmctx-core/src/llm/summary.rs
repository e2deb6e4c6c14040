//! Summarization seam toward the model-call layer
//!
//! The importance strategy hands medium-importance messages to a
//! [`SummaryClient`] and replaces them with the single message it returns.
//! Real deployments wire a chat-completion client here; the crate ships only
//! the offline [`ExtractiveSummaryClient`].

use async_trait::async_trait;

use super::messages::{Message, MessageRole};
use super::model::ModelId;
use crate::error::PmctxResult;

/// Prompt sent with every summarization request
pub const SUMMARY_PROMPT: &str = r#"Summarize the following part of a project-management assistant conversation so the agent can continue without it. Preserve:

1. Decisions made and who made them
2. Results returned by tools (tickets, sprints, assignees, dates, counts)
3. Identifiers verbatim: project keys, issue keys, sprint names, user names
4. Errors or failed operations and their cause
5. Open questions and the next step the user asked for

Only include facts stated in the messages. Be concise."#;

/// A single summarization request
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    /// Messages to condense, in conversation order
    pub messages: Vec<Message>,
    /// Model that should produce the summary
    pub model: ModelId,
    /// Upper bound for the summary length
    pub max_summary_tokens: usize,
    /// Instructions for the summarizer
    pub prompt: String,
}

impl SummaryRequest {
    pub fn new(messages: Vec<Message>, model: ModelId, max_summary_tokens: usize) -> Self {
        Self {
            messages,
            model,
            max_summary_tokens,
            prompt: SUMMARY_PROMPT.to_string(),
        }
    }

    /// Render the request as one prompt string for chat-completion clients
    pub fn render(&self) -> String {
        let conversation = self
            .messages
            .iter()
            .map(|m| {
                let tool_info = match (&m.tool_calls, &m.tool_call_id) {
                    (Some(calls), _) if !calls.is_empty() => {
                        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
                        format!(" [Tools: {}]", names.join(", "))
                    }
                    (_, Some(id)) => format!(" [Response to: {}]", id),
                    _ => String::new(),
                };
                format!("{}{}: {}", m.role.to_string().to_uppercase(), tool_info, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "{}\n\nMaximum summary length: {} tokens.\n\n---\nCONVERSATION TO SUMMARIZE:\n{}\n---",
            self.prompt, self.max_summary_tokens, conversation
        )
    }
}

/// Client able to condense a run of messages into one message
///
/// Implementations perform a network-bound model call. Failures are
/// returned as errors; the importance strategy recovers from them by
/// dropping the messages instead of summarizing them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryClient: Send + Sync {
    async fn summarize(&self, request: SummaryRequest) -> PmctxResult<Message>;
}

/// Offline summarizer producing a statistics and first/last exchange digest
#[derive(Debug, Clone)]
pub struct ExtractiveSummaryClient {
    excerpt_chars: usize,
}

impl Default for ExtractiveSummaryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractiveSummaryClient {
    pub fn new() -> Self {
        Self { excerpt_chars: 160 }
    }

    /// Set how many characters of the first and last message to quote
    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    fn excerpt(&self, content: &str) -> String {
        if content.chars().count() <= self.excerpt_chars {
            content.to_string()
        } else {
            let cut: String = content.chars().take(self.excerpt_chars).collect();
            format!("{}...", cut)
        }
    }
}

#[async_trait]
impl SummaryClient for ExtractiveSummaryClient {
    async fn summarize(&self, request: SummaryRequest) -> PmctxResult<Message> {
        let messages = &request.messages;
        let count = |role: MessageRole| messages.iter().filter(|m| m.role == role).count();

        let first = messages
            .first()
            .map(|m| self.excerpt(&m.content))
            .unwrap_or_default();
        let last = messages
            .last()
            .map(|m| self.excerpt(&m.content))
            .unwrap_or_default();

        let content = format!(
            "Earlier conversation ({} messages: {} user, {} assistant, {} tool results).\nFirst: {}\nLast: {}",
            messages.len(),
            count(MessageRole::User),
            count(MessageRole::Assistant),
            count(MessageRole::Tool),
            first,
            last,
        );

        Ok(Message::assistant(content))
    }
}
