use super::adapter::{PlatformAdapter, ThirdPartyAdapter};
use super::config::PlatformSettings;
use super::errors::ConnectorError;
use super::platform::Platform;
use crate::health::{ClassificationPolicy, HttpProbe, ServiceDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fixed mapping from platform to adapter, built once at startup.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<Platform, Arc<dyn ThirdPartyAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds HTTP adapters for every enabled platform in `settings`.
    pub fn from_settings(
        settings: &[PlatformSettings],
        probe: Arc<HttpProbe>,
        policy: ClassificationPolicy,
    ) -> Result<Self, ConnectorError> {
        let mut registry = Self::new();
        for platform_settings in settings.iter().filter(|s| s.enabled) {
            let adapter = PlatformAdapter::new(
                platform_settings.platform,
                platform_settings.url.clone(),
                probe.clone(),
                policy,
            )?;
            tracing::info!(
                platform = %platform_settings.platform,
                url = %adapter.descriptor().url,
                "Registered platform adapter"
            );
            registry.register(Arc::new(adapter))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn ThirdPartyAdapter>) -> Result<(), ConnectorError> {
        let platform = adapter.platform();
        if adapter.descriptor().id != platform.id() {
            return Err(ConnectorError::Misregistered {
                platform: platform.id().to_string(),
                service_id: adapter.descriptor().id.clone(),
            });
        }
        if self.adapters.contains_key(&platform) {
            return Err(ConnectorError::DuplicatePlatform(platform.id().to_string()));
        }
        self.adapters.insert(platform, adapter);
        Ok(())
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn ThirdPartyAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Resolves a service identifier to its adapter.
    pub fn lookup(&self, id: &str) -> Result<Arc<dyn ThirdPartyAdapter>, ConnectorError> {
        let platform: Platform = id.parse()?;
        self.get(platform)
            .ok_or_else(|| ConnectorError::UnknownPlatform(id.to_string()))
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn ThirdPartyAdapter>> {
        self.adapters.values()
    }

    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.adapters
            .values()
            .map(|adapter| adapter.descriptor().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
