//! ProviderSelector: picks the backend that answers for the app's lifetime.
//!
//! Priority order, first success wins: local server (if preferred, reachable
//! and the model is in its catalog), cloud (if a key is configured), stand-in.
//! The stand-in branch cannot fail, so selection always produces an adapter.
//!
//! Selection performs network probes; don't run it concurrently against the
//! same configuration.

use std::sync::Arc;

use crate::ai::{
    CloudAdapter, LocalAdapter, OllamaBackend, OllamaClient, OpenAIBackend, ProviderAdapter,
    StandInAdapter, StandInBackend,
};
use crate::config::Config;
use crate::error::ProviderError;
use crate::provider::{Availability, ProviderDescriptor, ProviderKind};

/// The chosen adapter plus diagnostics for the UI banner.
#[derive(Clone)]
pub struct ProviderSelection {
    pub adapter: Arc<dyn ProviderAdapter>,
    /// Short tag naming the branch taken, e.g. `Ollama (phi3:mini)`.
    pub label: String,
    /// Every candidate in probe order with its final availability.
    pub candidates: Vec<ProviderDescriptor>,
}

impl ProviderSelection {
    pub fn kind(&self) -> ProviderKind {
        self.adapter.kind()
    }
}

impl std::fmt::Debug for ProviderSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSelection")
            .field("kind", &self.adapter.kind())
            .field("label", &self.label)
            .field("candidates", &self.candidates)
            .finish()
    }
}

pub struct ProviderSelector;

impl ProviderSelector {
    pub async fn select(config: &Config) -> ProviderSelection {
        Self::select_with(config, StandInBackend::new()).await
    }

    /// Same as [`ProviderSelector::select`] with a caller-supplied stand-in.
    pub async fn select_with(config: &Config, stand_in: StandInBackend) -> ProviderSelection {
        let mut candidates = Vec::with_capacity(3);

        let local = Self::probe_local(config).await;
        let local_won = local.availability.is_available();
        candidates.push(local);
        if local_won {
            candidates.push(cloud_descriptor(config).with_availability(Availability::Skipped));
            candidates.push(stand_in_descriptor().with_availability(Availability::Skipped));
            let adapter = LocalAdapter::with_config(
                OllamaBackend::from_config(&config.local),
                &config.history,
            );
            return Self::finish(Arc::new(adapter), local_label(config), candidates);
        }

        let mut cloud = cloud_descriptor(config);
        if config.cloud.is_configured() {
            match OpenAIBackend::new(&config.cloud) {
                Ok(backend) => {
                    candidates.push(cloud.with_availability(Availability::Available));
                    candidates.push(stand_in_descriptor().with_availability(Availability::Skipped));
                    let adapter = CloudAdapter::with_config(backend, &config.history);
                    return Self::finish(Arc::new(adapter), "ChatGPT (Cloud)".to_string(), candidates);
                }
                Err(e) => {
                    tracing::warn!("cloud provider unavailable: {e}");
                    cloud = cloud.with_availability(Availability::Unavailable(e.to_string()));
                }
            }
        } else {
            tracing::debug!("no cloud API key configured");
            cloud = cloud.with_availability(Availability::NotConfigured);
        }
        candidates.push(cloud);

        candidates.push(stand_in_descriptor().with_availability(Availability::Available));
        let adapter = StandInAdapter::with_config(stand_in, &config.history);
        Self::finish(Arc::new(adapter), "Stand-in (Demo)".to_string(), candidates)
    }

    /// Liveness first, then the catalog. Never errors; failures are recorded
    /// on the returned descriptor.
    pub async fn probe_local(config: &Config) -> ProviderDescriptor {
        let local = &config.local;
        let descriptor =
            ProviderDescriptor::new(ProviderKind::Local, Some(&local.endpoint), &local.model);

        if !local.should_use_local() {
            return descriptor.with_availability(Availability::NotConfigured);
        }

        if !local.provider.eq_ignore_ascii_case("ollama") {
            tracing::warn!(provider = %local.provider, "unsupported local provider");
            let reason = ProviderError::Unsupported(format!("local provider '{}'", local.provider));
            return descriptor.with_availability(Availability::Unavailable(reason.to_string()));
        }

        tracing::debug!(endpoint = %local.endpoint, model = %local.model, "probing local backend");
        let client = OllamaClient::new(&local.endpoint);

        if !client.is_available(config.probe.liveness_timeout()).await {
            tracing::warn!(endpoint = %local.endpoint, "local backend is not running");
            return descriptor
                .with_availability(Availability::Unavailable("server not reachable".to_string()));
        }

        match client.has_model(&local.model, config.probe.catalog_timeout()).await {
            Ok(true) => descriptor.with_availability(Availability::Available),
            Ok(false) => {
                tracing::warn!(model = %local.model, "model has not been downloaded");
                descriptor.with_availability(Availability::Unavailable(format!(
                    "model '{}' not found",
                    local.model
                )))
            }
            Err(e) => {
                tracing::warn!("local catalog check failed: {e}");
                descriptor.with_availability(Availability::Unavailable(e.to_string()))
            }
        }
    }

    fn finish(
        adapter: Arc<dyn ProviderAdapter>,
        label: String,
        candidates: Vec<ProviderDescriptor>,
    ) -> ProviderSelection {
        tracing::info!(provider = %adapter.kind(), label = %label, "selected provider");
        ProviderSelection {
            adapter,
            label,
            candidates,
        }
    }
}

fn local_label(config: &Config) -> String {
    format!("Ollama ({})", config.local.model)
}

fn cloud_descriptor(config: &Config) -> ProviderDescriptor {
    ProviderDescriptor::new(ProviderKind::Cloud, Some(&config.cloud.endpoint), &config.cloud.model)
}

fn stand_in_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::new(ProviderKind::StandIn, None, "stand-in")
}
