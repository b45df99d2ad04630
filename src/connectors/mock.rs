use super::adapter::ThirdPartyAdapter;
use super::platform::Platform;
use crate::health::{HealthSample, HealthState, ServiceDescriptor};
use async_trait::async_trait;

/// Mock adapter for testing - always reports the same state
pub struct MockAdapter {
    platform: Platform,
    descriptor: ServiceDescriptor,
    state: HealthState,
}

impl MockAdapter {
    pub fn new(platform: Platform, state: HealthState) -> Self {
        Self {
            platform,
            descriptor: ServiceDescriptor::third_party(
                platform.id(),
                platform.display_name(),
                platform.default_url(),
            ),
            state,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.descriptor.id = id.to_string();
        self
    }
}

#[async_trait]
impl ThirdPartyAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn check_status(&self) -> HealthSample {
        HealthSample::new(&self.descriptor.id, self.state, 42)
    }
}
