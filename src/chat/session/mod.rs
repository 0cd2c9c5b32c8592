
use tracing::{debug, info};

use super::client::{ChatMessage, ChatModel, ChatStream};
use crate::memory::ConversationMemory;
use crate::retriever::Retriever;
use crate::{AssistantError, Result};

/// Persona and behavior instructions for the assistant
pub const SYSTEM_PROMPT: &str = r#"You are BookMind, an assistant that answers questions from a private library of books. Your role is to provide clear, accurate, and concise answers grounded in the passages retrieved from the library, and to cite the book and author behind every answer.

Behavior Guidelines
1. Answering User Questions:
   - Understand the user's input thoroughly and provide accurate responses.
   - Your answers should always be clear and relevant to the user's question.
   - Use simplified explanations when necessary to make the information user-friendly.

2. Citing Sources:
   - At the end of every answer, include the sources (book name and author) from which you derived it.
   - Use the phrase "Inspired by:" as the heading for the sources section.
   - If multiple sources are used, list all relevant sources clearly. Avoid duplication and ensure proper attribution.

3. When No Relevant Information is Found:
   - Politely inform the user that the library does not contain relevant information.
   - Suggest possible alternative questions or ask the user to clarify.

Edge Cases:
- If the user input is a greeting or small talk rather than a question (e.g., "hi", "hello", "how are you?"), respond conversationally without any sources or references.
- If the user's question is unrelated to the library's subject matter, politely say you have no information on that topic.
- If the retrieved passages include unrelated sources, prioritize the most relevant ones and explain why they were chosen.
- If no sources are provided with the question, do not include an "Inspired by:" section or any references heading in the response."#;

/// One conversation: retrieval, prompt assembly, LLM invocation, and the
/// session's memory. Strictly sequential; a session is owned by exactly one
/// caller and dropped when the conversation ends.
pub struct ChatSession {
    retriever: Retriever,
    model: Box<dyn ChatModel>,
    memory: ConversationMemory,
}

/// Lazy answer deltas for one question. Single-pass and non-restartable:
/// the turn is committed to the session's memory only once the stream has
/// been fully drained, so an early drop or a mid-stream error leaves the
/// memory unchanged.
pub struct AnswerStream<'a> {
    memory: &'a mut ConversationMemory,
    question: String,
    inner: ChatStream,
    answer: String,
    finished: bool,
}

impl Iterator for AnswerStream<'_> {
    type Item = Result<String>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.inner.next() {
            Some(Ok(delta)) => {
                self.answer.push_str(&delta);
                Some(Ok(delta))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                self.memory.append(&self.question, &self.answer);
                debug!(
                    "Committed streamed turn to memory ({} turns total)",
                    self.memory.len()
                );
                None
            }
        }
    }
}

impl ChatSession {
    #[inline]
    pub fn new(retriever: Retriever, model: Box<dyn ChatModel>) -> Self {
        Self {
            retriever,
            model,
            memory: ConversationMemory::new(),
        }
    }

    #[inline]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Forget the conversation so far
    #[inline]
    pub fn reset(&mut self) {
        self.memory.clear();
    }

    /// Answer one question, blocking until the full answer is available.
    ///
    /// A failed LLM call surfaces as `Generation` and leaves the memory
    /// unchanged; the question is not retried.
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let (question, messages) = self.prepare(question).await?;

        let answer = self.model.complete(&messages)?;

        self.memory.append(&question, &answer);
        info!("Answered question ({} turns in memory)", self.memory.len());

        Ok(answer)
    }

    /// Answer one question as a lazy sequence of text deltas. The turn is
    /// committed to memory only after the caller drains the stream.
    #[inline]
    pub async fn ask_stream(&mut self, question: &str) -> Result<AnswerStream<'_>> {
        let (question, messages) = self.prepare(question).await?;

        let inner = self.model.stream(&messages)?;

        Ok(AnswerStream {
            memory: &mut self.memory,
            question,
            inner,
            answer: String::new(),
            finished: false,
        })
    }

    /// Validate the question, retrieve cited context, and assemble the full
    /// message list for the LLM.
    async fn prepare(&self, question: &str) -> Result<(String, Vec<ChatMessage>)> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let retrieval = self.retriever.retrieve(question).await?;
        debug!(
            "Assembling prompt with {} retrieved chunks and {} memory turns",
            retrieval.chunks.len(),
            self.memory.len()
        );

        let mut messages = Vec::with_capacity(self.memory.len() * 2 + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(self.memory.as_messages());
        messages.push(ChatMessage::user(user_prompt(
            question,
            &retrieval.citations,
        )));

        Ok((question.to_string(), messages))
    }
}

/// Build the user turn: the question, plus the citation block as a grounding
/// hint for the model when anything was retrieved.
fn user_prompt(question: &str, citations: &str) -> String {
    if citations.is_empty() {
        format!("User Input: {question}")
    } else {
        format!("User Input: {question}\n\nSources:\n{citations}")
    }
}
