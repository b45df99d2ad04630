use super::errors::ConnectorError;
use super::platform::Platform;
use super::rules::SourceRule;
use crate::health::{ClassificationPolicy, HealthSample, HttpProbe, ServiceDescriptor};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Probe and classification pairing for one external platform.
///
/// `check_status` never fails: a broken platform is reported as a down or unknown sample.
#[async_trait]
pub trait ThirdPartyAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn descriptor(&self) -> &ServiceDescriptor;

    async fn check_status(&self) -> HealthSample;
}

/// HTTP adapter driven by the platform's [`SourceRule`].
pub struct PlatformAdapter {
    platform: Platform,
    descriptor: ServiceDescriptor,
    probe: Arc<HttpProbe>,
    rule: SourceRule,
    policy: ClassificationPolicy,
}

impl PlatformAdapter {
    pub fn new(
        platform: Platform,
        url: Option<String>,
        probe: Arc<HttpProbe>,
        policy: ClassificationPolicy,
    ) -> Result<Self, ConnectorError> {
        let url = url.unwrap_or_else(|| platform.default_url().to_string());
        let descriptor = ServiceDescriptor::third_party(platform.id(), platform.display_name(), &url);

        Ok(Self {
            platform,
            descriptor,
            probe,
            rule: SourceRule::for_platform(platform)?,
            policy,
        })
    }
}

#[async_trait]
impl ThirdPartyAdapter for PlatformAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    #[tracing::instrument(name = "Check platform status", skip(self), fields(platform = %self.platform))]
    async fn check_status(&self) -> HealthSample {
        let raw = match self
            .probe
            .fetch(&self.descriptor.id, &self.descriptor.url, self.rule.needs_body())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Platform probe could not be issued: {:?}", e);
                return HealthSample::unknown(&self.descriptor.id).with_error(e.to_string());
            }
        };

        let threshold = self.policy.threshold_for(&self.descriptor);
        let sample = self
            .rule
            .classify(&raw, threshold)
            .into_sample(&self.descriptor.id, &raw, Utc::now());

        tracing::debug!(state = %sample.state, latency_ms = sample.latency_ms, "Platform checked");
        sample
    }
}
