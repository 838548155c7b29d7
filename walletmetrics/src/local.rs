//! Commands working directly on the local stores, without running the API.

use anyhow::Context;
use prometheus::Registry;
use std::process::ExitCode;
use walletmetrics_analytics::{AnalyticsConfig, Property, TrackedEvent};
use walletmetrics_infrastructure::{init_tracing, Tracing};
use walletmetrics_preferences::StoreConfig;
use walletmetrics_reporter::Reporting;

#[derive(clap::Args, Debug)]
pub struct LocalConfig {
    #[command(flatten)]
    pub analytics: AnalyticsConfig,

    #[command(flatten)]
    pub store: StoreConfig,
}

impl LocalConfig {
    async fn reporting(self) -> anyhow::Result<Reporting> {
        init_tracing("walletmetrics", Tracing::Disabled);
        Reporting::new(self.analytics, &self.store, &Registry::new()).await
    }
}

fn parse_property(value: &str) -> Result<(String, Property), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), Property::parse(value))),
        _ => Err(format!("expected 'key=value', got '{value}'")),
    }
}

#[derive(clap::Args, Debug)]
#[command(about = "Report a single event, respecting the metrics consent")]
pub struct Track {
    /// Name of the event
    pub name: String,

    /// Event property, numeric values are sent as numbers
    #[arg(short = 'p', long = "property", value_parser = parse_property)]
    pub properties: Vec<(String, Property)>,

    #[command(flatten)]
    pub local: LocalConfig,
}

impl Track {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let reporting = self.local.reporting().await?;

        let event = self
            .properties
            .into_iter()
            .fold(TrackedEvent::new(self.name), |event, (key, value)| {
                event.with_property(key, value)
            });

        let disposition = reporting.reporter.report(event).await;
        reporting
            .tracker
            .flush()
            .await
            .context("Failed to deliver the event")?;

        println!("{}", serde_json::to_string(&disposition)?);
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Consent {
    /// Show the current consent, `null` if the user was never asked
    Get(LocalConfig),
    /// Opt in to metrics, replaying deferred events
    Grant(LocalConfig),
    /// Opt out of metrics
    Revoke(LocalConfig),
}

impl Consent {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self {
            Self::Get(local) => {
                let reporting = local.reporting().await?;
                let consent = reporting.reporter.consent().await?;
                println!("{}", serde_json::to_string(&consent)?);
            }
            Self::Grant(local) => {
                let reporting = local.reporting().await?;
                let summary = reporting.reporter.grant_consent().await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                if summary.remaining > 0 {
                    log::warn!("{} deferred events could not be delivered", summary.remaining);
                    return Ok(ExitCode::FAILURE);
                }
            }
            Self::Revoke(local) => {
                let reporting = local.reporting().await?;
                reporting.reporter.revoke_consent().await?;
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

#[derive(clap::Args, Debug)]
#[command(about = "Forward deferred events, if the user opted in to metrics")]
pub struct Replay {
    #[command(flatten)]
    pub local: LocalConfig,
}

impl Replay {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let reporting = self.local.reporting().await?;
        let summary = reporting.reporter.replay().await?;

        println!("{}", serde_json::to_string_pretty(&summary)?);
        if summary.remaining > 0 {
            log::warn!("{} deferred events could not be delivered", summary.remaining);
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(clap::Args, Debug)]
#[command(about = "List events waiting for the metrics consent")]
pub struct Deferred {
    #[command(flatten)]
    pub local: LocalConfig,
}

impl Deferred {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let reporting = self.local.reporting().await?;
        let events = reporting.reporter.deferred_events().await?;

        println!("{}", serde_json::to_string_pretty(&events)?);
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[test]
    fn property_argument() {
        assert_eq!(
            parse_property("message_title=Title1"),
            Ok(("message_title".to_string(), Property::Text("Title1".into())))
        );
        assert_eq!(parse_property("tab=2"), Ok(("tab".to_string(), Property::Number(2.0))));
        assert_eq!(parse_property("a=b=c"), Ok(("a".to_string(), Property::Text("b=c".into()))));
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=value").is_err());
    }

    #[test]
    fn parse_track_command() {
        let cli = crate::Cli::parse_from([
            "walletmetrics",
            "track",
            "Welcome Screen Engagement",
            "-p",
            "message_title=Title1",
            "--in-memory",
        ]);

        match cli.command {
            crate::Command::Track(track) => {
                assert_eq!(track.name, "Welcome Screen Engagement");
                assert_eq!(track.properties.len(), 1);
                assert!(track.local.store.in_memory);
            }
            _ => panic!("expected the track command"),
        }
    }

    #[tokio::test]
    async fn track_in_memory() -> anyhow::Result<()> {
        let track = Track {
            name: "Onboarding Started".into(),
            properties: vec![("message_title".into(), Property::Text("Title1".into()))],
            local: LocalConfig {
                analytics: AnalyticsConfig::default(),
                store: StoreConfig {
                    in_memory: true,
                    ..Default::default()
                },
            },
        };

        track.run().await?;
        Ok(())
    }
}
