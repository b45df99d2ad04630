/// Errors raised while building or querying the third-party adapter set
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Identifier does not name a known or registered platform
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
    /// Two adapters claim the same platform
    #[error("Platform registered twice: {0}")]
    DuplicatePlatform(String),
    /// Adapter descriptor does not carry its platform identifier
    #[error("Adapter for {platform} describes service {service_id}")]
    Misregistered { platform: String, service_id: String },
    /// Page marker pattern failed to compile
    #[error("Invalid status pattern for {platform}: {source}")]
    InvalidPattern {
        platform: String,
        #[source]
        source: regex::Error,
    },
}
