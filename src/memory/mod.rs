// Conversational memory module
// Append-only log of question/answer turns, replayed as prompt context


use crate::chat::{ChatMessage, Role};

/// One question/answer pair in a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Ordered, append-only log of conversation turns, scoped to one session.
///
/// Every turn is retained and resent as context on every subsequent call,
/// so per-call cost grows linearly with conversation length. That matches
/// the intended use (short interactive sessions); no eviction is performed.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append(&mut self, question: &str, answer: &str) {
        self.turns.push(Turn {
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Replay the full history as alternating user/assistant messages in
    /// chronological order.
    #[inline]
    pub fn as_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2);
        for turn in &self.turns {
            messages.push(ChatMessage {
                role: Role::User,
                content: turn.question.clone(),
            });
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: turn.answer.clone(),
            });
        }
        messages
    }
}
