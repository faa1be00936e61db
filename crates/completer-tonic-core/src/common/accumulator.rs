//! Aggregation of streamed completion events.
//!
//! Hosts that consume a completion stream often want a single response out of
//! the individual deltas. [`CompletionAccumulator`] folds events in arrival
//! order: identifiers and labels are overwritten by the latest non-empty
//! value, text and refusal fragments are appended, and token usage is summed.
//!
//! Tool calls arrive in fragments too. A fragment with a non-empty `id` opens
//! a new call; fragments without one extend the most recent call's `name`
//! and `arguments`.

use crate::proto::{Completion, Content, Message, ToolCall, Usage};

#[derive(Debug, Default, Clone)]
pub struct CompletionAccumulator {
    id: String,
    model: String,
    role: String,
    reason: Option<String>,
    text: String,
    refusal: String,
    tool_calls: Vec<ToolCall>,
    usage: Option<Usage>,
}

impl CompletionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the accumulated state.
    ///
    /// Both `delta` and `message` payloads are accepted, so callers that only
    /// want the deltas must filter before calling.
    pub fn add(&mut self, completion: &Completion) {
        if !completion.id.is_empty() {
            self.id.clone_from(&completion.id);
        }

        if !completion.model.is_empty() {
            self.model.clone_from(&completion.model);
        }

        if let Some(reason) = completion.reason.as_ref().filter(|r| !r.is_empty()) {
            self.reason = Some(reason.clone());
        }

        if let Some(message) = completion.message.as_ref().or(completion.delta.as_ref()) {
            if !message.role.is_empty() {
                self.role.clone_from(&message.role);
            }

            for content in &message.content {
                if let Some(text) = &content.text {
                    self.text.push_str(text);
                }
                if let Some(refusal) = &content.refusal {
                    self.refusal.push_str(refusal);
                }
                if let Some(call) = &content.tool_call {
                    self.add_tool_call(call);
                }
            }
        }

        if let Some(usage) = &completion.usage {
            let total = self.usage.get_or_insert_with(Usage::default);
            total.input_tokens += usage.input_tokens;
            total.output_tokens += usage.output_tokens;
        }
    }

    fn add_tool_call(&mut self, fragment: &ToolCall) {
        if !fragment.id.is_empty() {
            self.tool_calls.push(ToolCall {
                id: fragment.id.clone(),
                ..Default::default()
            });
        }

        // A continuation with no call to continue is dropped.
        let Some(call) = self.tool_calls.last_mut() else {
            return;
        };
        call.name.push_str(&fragment.name);
        call.arguments.push_str(&fragment.arguments);
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Builds the aggregate completion from everything added so far.
    pub fn result(&self) -> Completion {
        let mut content = Vec::new();

        if !self.text.is_empty() {
            content.push(Content::from_text(self.text.clone()));
        }

        if !self.refusal.is_empty() {
            content.push(Content {
                refusal: Some(self.refusal.clone()),
                ..Default::default()
            });
        }

        content.extend(self.tool_calls.iter().map(|call| Content {
            tool_call: Some(call.clone()),
            ..Default::default()
        }));

        Completion {
            id: self.id.clone(),
            model: self.model.clone(),
            reason: self.reason.clone(),
            delta: None,
            message: Some(Message {
                role: self.role.clone(),
                content,
            }),
            usage: self.usage.clone(),
        }
    }
}

impl<'a> Extend<&'a Completion> for CompletionAccumulator {
    fn extend<I: IntoIterator<Item = &'a Completion>>(&mut self, iter: I) {
        for completion in iter {
            self.add(completion);
        }
    }
}
