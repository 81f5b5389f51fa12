//! Deterministic stand-in backend.
//!
//! Used when neither a local server nor a cloud key is usable, so the
//! assistant always answers something. Replies are fixed functions of the
//! prompt; only the simulated latency is configurable.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::{ChatBackend, FragmentStream};
use crate::error::Result;
use crate::provider::ProviderKind;
use crate::state::{ChatMessage, ChatRole};

const MAX_WORDS_PER_FRAGMENT: usize = 4;
const MAX_ECHO_CHARS: usize = 60;

#[derive(Debug, Clone)]
pub struct StandInBackend {
    reply_delay: Duration,
    fragment_delay: Duration,
}

impl Default for StandInBackend {
    fn default() -> Self {
        Self {
            reply_delay: Duration::from_millis(800),
            fragment_delay: Duration::from_millis(120),
        }
    }
}

impl StandInBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delays(reply_delay: Duration, fragment_delay: Duration) -> Self {
        Self {
            reply_delay,
            fragment_delay,
        }
    }

    /// No simulated latency at all.
    pub fn instant() -> Self {
        Self::with_delays(Duration::ZERO, Duration::ZERO)
    }

    pub fn reply_for(prompt: &str) -> String {
        format!("(stand-in) Received: \"{}\"", shorten(prompt, MAX_ECHO_CHARS))
    }

    pub fn streamed_reply_for(prompt: &str) -> String {
        format!(
            "(stand-in streaming) Answer for: {}. This is a simulated streaming response.",
            shorten(prompt, MAX_ECHO_CHARS)
        )
    }
}

fn last_prompt(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

/// Cuts `s` to at most `max` characters, marking the cut with "...".
fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Splits `text` on single spaces into fragments of a few words. Concatenating
/// the fragments gives back `text` exactly, runs of spaces and newlines included.
fn chunk_into_words(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split(' ').collect();
    words
        .chunks(max_words.max(1))
        .enumerate()
        .map(|(i, chunk)| {
            let joined = chunk.join(" ");
            if i == 0 { joined } else { format!(" {joined}") }
        })
        .collect()
}

#[async_trait]
impl ChatBackend for StandInBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::StandIn
    }

    fn model(&self) -> &str {
        "stand-in"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        tokio::time::sleep(self.reply_delay).await;
        Ok(Self::reply_for(last_prompt(messages)))
    }

    fn complete_stream<'a>(&'a self, messages: Vec<ChatMessage>) -> FragmentStream<'a> {
        let full = Self::streamed_reply_for(last_prompt(&messages));
        let fragments = chunk_into_words(&full, MAX_WORDS_PER_FRAGMENT);
        let delay = self.fragment_delay;

        async_stream::stream! {
            for fragment in fragments {
                tokio::time::sleep(delay).await;
                yield Ok(fragment);
            }
        }
        .boxed()
    }
}
