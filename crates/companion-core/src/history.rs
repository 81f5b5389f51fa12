//! Bounded conversation history with a pinned system directive.
//!
//! Index 0 is always the `system` directive. Appends trim synchronously, so the
//! log never exceeds its cap: the directive plus the most recent `cap - 1`
//! messages are kept.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::state::{ChatMessage, ChatRole};

/// Smallest cap that still fits the directive and one message.
const MIN_CAP: usize = 2;

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    directive: String,
    cap: usize,
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new(directive: impl Into<String>, cap: usize) -> Self {
        let directive = directive.into();
        Self {
            messages: vec![ChatMessage::system(directive.clone())],
            directive,
            cap: cap.max(MIN_CAP),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true: the directive is always present.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends `message` and returns whatever the trim evicted, oldest first.
    pub fn append(&mut self, message: ChatMessage) -> Vec<ChatMessage> {
        self.messages.push(message);
        self.trim_if_needed()
    }

    pub fn trim_if_needed(&mut self) -> Vec<ChatMessage> {
        if self.messages.len() <= self.cap {
            return Vec::new();
        }
        let excess = self.messages.len() - self.cap;
        self.messages.drain(1..1 + excess).collect()
    }

    pub fn as_ordered_list(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Back to just the directive.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.messages.push(ChatMessage::system(self.directive.clone()));
    }

    /// Pops the newest message if it is exactly `message`. The directive is
    /// never removed.
    pub fn remove_last_if(&mut self, message: &ChatMessage) -> bool {
        if self.messages.len() > 1 && self.messages.last() == Some(message) {
            self.messages.pop();
            true
        } else {
            false
        }
    }

    /// Puts previously evicted messages back right after the directive, then
    /// trims again so the cap still holds.
    pub fn restore_oldest(&mut self, evicted: Vec<ChatMessage>) {
        self.messages.splice(1..1, evicted);
        self.trim_if_needed();
    }
}

/// History shared between an adapter and the streams it hands out.
#[derive(Debug)]
pub struct SharedHistory {
    inner: Mutex<ConversationHistory>,
}

impl SharedHistory {
    pub fn new(history: ConversationHistory) -> Self {
        Self {
            inner: Mutex::new(history),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ConversationHistory> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().as_ordered_list().to_vec()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Appends the user prompt and returns the turn that owns it. Dropping the
    /// turn without [`PendingTurn::commit`] takes the prompt back out and
    /// restores anything its append evicted.
    pub fn begin_turn(&self, prompt: &str) -> PendingTurn<'_> {
        let user = ChatMessage::user(prompt);
        let (messages, evicted) = {
            let mut history = self.lock();
            let evicted = history.append(user.clone());
            (history.as_ordered_list().to_vec(), evicted)
        };
        PendingTurn {
            history: self,
            user,
            messages,
            evicted,
            committed: false,
        }
    }
}

/// A user prompt waiting for its answer.
#[derive(Debug)]
pub struct PendingTurn<'a> {
    history: &'a SharedHistory,
    user: ChatMessage,
    messages: Vec<ChatMessage>,
    evicted: Vec<ChatMessage>,
    committed: bool,
}

impl PendingTurn<'_> {
    /// The conversation to send to the backend, ending with this prompt.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn commit(mut self, answer: &str) {
        self.history.lock().append(ChatMessage::assistant(answer));
        self.committed = true;
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut history = self.history.lock();
        if history.remove_last_if(&self.user) {
            history.restore_oldest(std::mem::take(&mut self.evicted));
            tracing::debug!("rolled back unanswered prompt");
        }
    }
}
