//! `statuswatch` binary.
//!
//! ```text
//! statuswatch run
//! statuswatch check --service github
//! statuswatch list
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use statuswatch::configuration::get_configuration_from;
use statuswatch::health::{ServiceState, TimeRange};
use statuswatch::monitor::{CycleOutcome, Monitor, MonitorEvent};
use statuswatch::telemetry::{get_subscriber, init_subscriber};

#[derive(Parser, Debug)]
#[command(
    name = "statuswatch",
    version,
    about = "Probe a roster of services and track their health"
)]
struct Cli {
    /// Configuration file, extension optional (default: ./configuration.yaml)
    #[arg(long, global = true, env = "STATUSWATCH_CONFIG", default_value = "configuration")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the roster periodically until interrupted
    Run {
        /// Override the configured check interval (seconds)
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Run one check cycle, or check a single service
    Check {
        /// Service or platform identifier
        #[arg(long, value_name = "ID")]
        service: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the configured roster
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = get_subscriber("statuswatch".into(), "info".into(), std::io::stderr);
    init_subscriber(subscriber)?;

    let settings = get_configuration_from(&cli.config).context("Failed to read configuration.")?;
    let monitor = Monitor::from_settings(&settings)?;

    match cli.command {
        Command::Run { interval } => {
            let interval = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| settings.monitor.check_interval());
            run(monitor, interval).await?
        }
        Command::Check { service, json } => {
            let states = match service {
                Some(id) => vec![monitor.check_service(&id).await?],
                None => {
                    if let CycleOutcome::AlreadyRunning = monitor.check_all().await? {
                        anyhow::bail!("a check cycle is already running");
                    }
                    monitor.snapshot().await.services
                }
            };
            print_states(&states, json)?;
            monitor.shutdown().await;
        }
        Command::List => {
            for descriptor in monitor.roster() {
                println!(
                    "{:<16} {:<11} {:<9} {}",
                    descriptor.id,
                    format!("{:?}", descriptor.kind),
                    format!("{:?}", descriptor.component_type).to_lowercase(),
                    descriptor.url
                );
            }
        }
    }

    Ok(())
}

async fn run(monitor: Monitor, interval: std::time::Duration) -> anyhow::Result<()> {
    let mut events = monitor.subscribe();
    monitor.start_periodic(interval).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(MonitorEvent::CycleCompleted(report)) => {
                    for sample in report.samples.iter().filter(|s| !s.state.is_operational()) {
                        tracing::warn!(
                            service_id = %sample.service_id,
                            state = %sample.state,
                            error = sample.error_message.as_deref().unwrap_or_default(),
                            data_feed_issue = sample.is_data_feed_issue(),
                            "Service not operational"
                        );
                    }
                }
                Ok(MonitorEvent::ServiceChecked(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Shutting down");
    monitor.shutdown().await;

    let statistics = futures::future::try_join_all(
        monitor
            .roster()
            .iter()
            .map(|descriptor| monitor.statistics(&descriptor.id, TimeRange::all())),
    )
    .await?;
    for (descriptor, stats) in monitor.roster().iter().zip(statistics) {
        tracing::info!(
            service_id = %descriptor.id,
            total_checks = stats.total_checks,
            uptime_percentage = stats.uptime_percentage,
            average_response_time = stats.average_response_time,
            outages = stats.outage_count,
            "Session statistics"
        );
    }
    Ok(())
}

fn print_states(states: &[ServiceState], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(states)?);
        return Ok(());
    }

    for state in states {
        let sample = &state.latest;
        println!(
            "{:<16} {:<14} {:>6} ms  {}",
            state.id(),
            sample.state.to_string(),
            sample.latency_ms,
            sample.error_message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
