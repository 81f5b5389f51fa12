use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Local,
    Cloud,
    StandIn,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Cloud => "cloud",
            ProviderKind::StandIn => "stand-in",
        }
    }

    /// Probe order used by the selector.
    pub fn all() -> Vec<ProviderKind> {
        vec![ProviderKind::Local, ProviderKind::Cloud, ProviderKind::StandIn]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Local => "Ollama (Local)",
            ProviderKind::Cloud => "ChatGPT (OpenAI)",
            ProviderKind::StandIn => "Stand-in (Demo)",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one candidate backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Availability {
    /// Not probed yet.
    Unknown,
    Available,
    Unavailable(String),
    NotConfigured,
    /// An earlier branch already won.
    Skipped,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Unknown => f.write_str("unknown"),
            Availability::Available => f.write_str("available"),
            Availability::Unavailable(reason) => write!(f, "unavailable ({reason})"),
            Availability::NotConfigured => f.write_str("not configured"),
            Availability::Skipped => f.write_str("skipped"),
        }
    }
}

/// A candidate backend as seen by the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    /// Endpoint URL, or `None` for backends without one.
    pub endpoint: Option<String>,
    pub model: String,
    pub availability: Availability,
}

impl ProviderDescriptor {
    pub fn new(kind: ProviderKind, endpoint: Option<&str>, model: &str) -> Self {
        Self {
            kind,
            endpoint: endpoint.map(str::to_string),
            model: model.to_string(),
            availability: Availability::Unknown,
        }
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }
}
