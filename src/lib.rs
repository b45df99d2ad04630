pub mod configuration;
pub mod connectors;
pub mod health;
pub mod monitor;
pub mod telemetry;
