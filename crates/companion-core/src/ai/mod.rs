//! Text-generation backends behind one contract.
//!
//! Each backend only knows how to turn a conversation into an answer
//! ([`ChatBackend`]). [`Adapter`] wraps a backend with the conversation history
//! and the empty-prompt and error-to-text rules, and is what the rest of the
//! crate talks to through [`ProviderAdapter`].

pub mod lines;
pub mod ollama;
pub mod openai;
pub mod stand_in;

pub use ollama::{OllamaBackend, OllamaClient};
pub use openai::{OpenAIBackend, OpenAIClient};
pub use stand_in::StandInBackend;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::history::{ConversationHistory, SharedHistory};
use crate::provider::ProviderKind;
use crate::state::ChatMessage;

/// A lazy, finite, single-pass sequence of answer fragments. A failure ends
/// the sequence with one `Err` item.
pub type FragmentStream<'a> = BoxStream<'a, Result<String>>;

/// Uniform one-shot and streaming text generation over one backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Model identifier the backend answers with.
    fn model(&self) -> &str;

    /// Complete answer for `prompt`. Backend failures come back as an
    /// error-describing text, never as an error. Empty prompts return an empty
    /// string without contacting the backend.
    async fn respond(&self, prompt: &str) -> String;

    /// Answer for `prompt` as it is produced. The prompt enters history on the
    /// first poll; the joined answer only once the sequence ends normally.
    fn stream<'a>(&'a self, prompt: &'a str) -> FragmentStream<'a>;

    /// Reset history to just the directive.
    fn clear_history(&self);

    /// Copy of the conversation so far.
    fn history(&self) -> Vec<ChatMessage>;

    fn history_len(&self) -> usize {
        self.history().len()
    }
}

/// One backend's wire protocol.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    fn complete_stream<'a>(&'a self, messages: Vec<ChatMessage>) -> FragmentStream<'a>;
}

/// A backend plus the conversation it owns.
pub struct Adapter<B> {
    backend: B,
    history: SharedHistory,
}

pub type LocalAdapter = Adapter<OllamaBackend>;
pub type CloudAdapter = Adapter<OpenAIBackend>;
pub type StandInAdapter = Adapter<StandInBackend>;

impl<B: ChatBackend> Adapter<B> {
    pub fn new(backend: B, history: ConversationHistory) -> Self {
        Self {
            backend,
            history: SharedHistory::new(history),
        }
    }

    pub fn with_config(backend: B, config: &HistoryConfig) -> Self {
        Self::new(
            backend,
            ConversationHistory::new(config.directive.clone(), config.cap),
        )
    }
}

#[async_trait]
impl<B: ChatBackend> ProviderAdapter for Adapter<B> {
    fn kind(&self) -> ProviderKind {
        self.backend.kind()
    }

    fn model(&self) -> &str {
        self.backend.model()
    }

    async fn respond(&self, prompt: &str) -> String {
        if prompt.trim().is_empty() {
            return String::new();
        }

        let turn = self.history.begin_turn(prompt);
        match self.backend.complete(turn.messages()).await {
            Ok(answer) => {
                turn.commit(&answer);
                answer
            }
            Err(e) => {
                tracing::warn!(provider = %self.backend.kind(), "request failed: {e}");
                e.user_message()
            }
        }
    }

    fn stream<'a>(&'a self, prompt: &'a str) -> FragmentStream<'a> {
        if prompt.trim().is_empty() {
            return stream::empty().boxed();
        }

        let kind = self.backend.kind();
        async_stream::stream! {
            let turn = self.history.begin_turn(prompt);
            let mut fragments = self.backend.complete_stream(turn.messages().to_vec());
            let mut answer = String::new();
            let mut failed = false;

            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(fragment) if fragment.is_empty() => {}
                    Ok(fragment) => {
                        answer.push_str(&fragment);
                        yield Ok(fragment);
                    }
                    Err(e) => {
                        tracing::warn!(provider = %kind, "stream failed: {e}");
                        failed = true;
                        yield Err(e);
                        break;
                    }
                }
            }

            if !failed {
                turn.commit(&answer);
            }
        }
        .boxed()
    }

    fn clear_history(&self) {
        self.history.clear();
    }

    fn history(&self) -> Vec<ChatMessage> {
        self.history.snapshot()
    }

    fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}
