//! Exchange log between the experiment and the model.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::context::Context;
use crate::errors::ConversationError;

/// One request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub input: String,
    pub output: String,
}

/// Ordered exchanges tied to one context.
///
/// In telephone mode the prompt shown to the model never carries history; the
/// exchanges are still kept so the last output can be rendered.
#[derive(Debug, Clone)]
pub struct Conversation {
    context: Arc<Context>,
    is_telephone: bool,
    exchanges: Vec<Exchange>,
}

impl Conversation {
    pub fn new(context: Arc<Context>, is_telephone: bool) -> Self {
        Self {
            context,
            is_telephone,
            exchanges: Vec::new(),
        }
    }

    pub fn add_exchange(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.exchanges.push(Exchange {
            input: input.into(),
            output: output.into(),
        });
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn is_telephone(&self) -> bool {
        self.is_telephone
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Build the prompt body the model would see.
    ///
    /// Telephone mode yields the context text alone. Full-history mode appends
    /// every exchange in insertion order.
    pub fn formulate_prompt(&self) -> String {
        let mut prompt = format!("{}\n", self.context);
        if !self.is_telephone {
            for exchange in &self.exchanges {
                prompt.push_str(&format!(
                    "\nUser: {}\nBot: {}",
                    exchange.input, exchange.output
                ));
            }
        }
        prompt
    }

    /// Human-readable transcript.
    ///
    /// Telephone mode returns only the latest output and fails on an empty log.
    pub fn render(&self) -> Result<String, ConversationError> {
        if self.is_telephone {
            return self
                .exchanges
                .last()
                .map(|e| e.output.clone())
                .ok_or(ConversationError::Empty);
        }

        Ok(self
            .exchanges
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.input, e.output))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl Serialize for Conversation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Valence;

    fn test_context() -> Arc<Context> {
        Arc::new(Context::new(
            "test",
            "Test context",
            false,
            false,
            Valence::Neutral,
        ))
    }

    fn with_two_exchanges(is_telephone: bool) -> Conversation {
        let mut conversation = Conversation::new(test_context(), is_telephone);
        conversation.add_exchange("Question 1", "Answer 1");
        conversation.add_exchange("Question 2", "Answer 2");
        conversation
    }

    #[test]
    fn test_new_conversation_is_empty() {
        let conversation = Conversation::new(test_context(), false);
        assert!(!conversation.is_telephone());
        assert!(conversation.exchanges().is_empty());
        assert_eq!(conversation.context().name, "test");
    }

    #[test]
    fn test_add_exchange_appends_in_order() {
        let conversation = with_two_exchanges(false);
        assert_eq!(conversation.exchanges().len(), 2);
        assert_eq!(conversation.exchanges()[0].input, "Question 1");
        assert_eq!(conversation.exchanges()[1].output, "Answer 2");
    }

    #[test]
    fn test_formulate_prompt_full_history_in_order() {
        let prompt = with_two_exchanges(false).formulate_prompt();
        assert_eq!(
            prompt,
            "Test context\n\nUser: Question 1\nBot: Answer 1\nUser: Question 2\nBot: Answer 2"
        );
    }

    #[test]
    fn test_formulate_prompt_telephone_has_no_history() {
        let prompt = with_two_exchanges(true).formulate_prompt();
        assert_eq!(prompt, "Test context\n");
        for text in ["Question 1", "Answer 1", "Question 2", "Answer 2"] {
            assert!(!prompt.contains(text));
        }
    }

    #[test]
    fn test_formulate_prompt_null_context() {
        let conversation = Conversation::new(Arc::new(Context::empty()), false);
        assert_eq!(conversation.formulate_prompt(), "\n");
        assert!(conversation.formulate_prompt().trim().is_empty());
    }

    #[test]
    fn test_render_full_history() {
        let rendered = with_two_exchanges(false).render().unwrap();
        assert_eq!(
            rendered,
            "User: Question 1\nAssistant: Answer 1\nUser: Question 2\nAssistant: Answer 2"
        );
    }

    #[test]
    fn test_render_telephone_returns_last_output() {
        assert_eq!(with_two_exchanges(true).render().unwrap(), "Answer 2");
    }

    #[test]
    fn test_render_empty_telephone_is_an_error() {
        let conversation = Conversation::new(test_context(), true);
        assert_eq!(conversation.render(), Err(ConversationError::Empty));
    }

    #[test]
    fn test_serializes_as_rendered_string() {
        let json = serde_json::to_value(with_two_exchanges(true)).unwrap();
        assert_eq!(json, serde_json::json!("Answer 2"));

        let empty = Conversation::new(test_context(), true);
        assert_eq!(serde_json::to_value(empty).unwrap(), serde_json::json!(""));
    }
}
