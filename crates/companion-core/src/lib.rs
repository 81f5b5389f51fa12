pub mod ai;
pub mod config;
pub mod error;
pub mod history;
pub mod provider;
pub mod selector;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use ai::{
    Adapter, ChatBackend, CloudAdapter, FragmentStream, LocalAdapter, OllamaBackend, OllamaClient,
    OpenAIBackend, OpenAIClient, ProviderAdapter, StandInAdapter, StandInBackend,
};
pub use config::Config;
pub use error::{ProviderError, Result};
pub use history::{ConversationHistory, SharedHistory};
pub use provider::{Availability, ProviderDescriptor, ProviderKind};
pub use selector::{ProviderSelection, ProviderSelector};
pub use session::{
    channel_notifier, ConversationSession, Notifier, RequestHandle, RequestOutcome, SessionEvent,
};
pub use state::{ChatMessage, ChatRole, PartialResponse, SessionSnapshot, SessionState};
