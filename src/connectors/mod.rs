//! Third-Party Platform Connectors
//!
//! This module provides adapters for checking external platforms (GitHub, Slack, Cloudflare, etc.).
//! Every platform publishes its health differently, so each one pairs its own probe with its own
//! classification rule.
//!
//! ## Architecture Pattern
//!
//! 1. `Platform` is a closed enum → an unknown identifier fails at config load, not at check time
//! 2. `Platform::source()` maps each platform to the shape of its status page
//! 3. `SourceRule` classifies that shape (Statuspage JSON, Slack API, bare reachability, HTML marker)
//! 4. `AdapterRegistry` is built once at startup and injected into the monitor as trait objects
//!
//! ## Testing
//!
//! ```ignore
//! let mut registry = AdapterRegistry::new();
//! registry.register(Arc::new(MockAdapter::new(Platform::Github, HealthState::Down)))?;
//! ```

pub mod adapter;
pub mod config;
pub mod errors;
pub mod platform;
pub mod registry;
pub mod rules;

#[cfg(test)]
pub mod mock;

pub use adapter::{PlatformAdapter, ThirdPartyAdapter};
pub use config::PlatformSettings;
pub use errors::ConnectorError;
pub use platform::{Platform, StatusSource};
pub use registry::AdapterRegistry;
pub use rules::SourceRule;
