mod server;

pub use server::{config, ErrorInformation};

use futures::future::{pending, select, Either};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use walletmetrics_analytics::AnalyticsConfig;
use walletmetrics_infrastructure::{health::checks::Probe, Infrastructure, InfrastructureConfig};
use walletmetrics_preferences::StoreConfig;
use walletmetrics_reporter::{ConsentGatedReporter, Reporting};

#[derive(clap::Args, Debug)]
#[command(about = "Run the api server", args_conflicts_with_subcommands = true)]
pub struct Run {
    #[arg(short, long, default_value = "[::1]")]
    pub bind: String,

    #[arg(short = 'p', long = "port", default_value_t = 8080)]
    pub port: u16,

    #[command(flatten)]
    pub analytics: AnalyticsConfig,

    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub infra: InfrastructureConfig,
}

impl Run {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        Infrastructure::from(self.infra)
            .run("walletmetrics-api", |context| async move {
                let (startup, check) = Probe::new("Local stores not opened yet");
                context.health.startup.register("stores", check).await;

                let Reporting {
                    reporter,
                    tracker,
                    flusher,
                    preferences,
                } = Reporting::new(self.analytics, &self.store, context.metrics.registry()).await?;
                startup.set(true);

                context
                    .health
                    .readiness
                    .register("preferences", move || {
                        let preferences = preferences.clone();
                        async move { preferences.ping().await }
                    })
                    .await;

                let state = Arc::new(AppState::new(reporter));
                let addr = SocketAddr::from_str(&format!("{}:{}", self.bind, self.port))?;
                let server = Box::pin(server::run(state, addr));
                let flusher = Box::pin(async move {
                    match flusher {
                        Some(flusher) => flusher.await,
                        None => pending().await,
                    }
                });

                let result = match select(server, flusher).await {
                    Either::Left((result, _)) => result,
                    Either::Right((result, _)) => result,
                };

                if let Err(err) = tracker.flush().await {
                    log::warn!("Failed to flush analytics batch on shutdown: {err}");
                }
                result
            })
            .await?;

        Ok(ExitCode::SUCCESS)
    }
}

pub struct AppState {
    reporter: ConsentGatedReporter,
}

impl AppState {
    pub fn new(reporter: ConsentGatedReporter) -> Self {
        Self { reporter }
    }
}

pub(crate) type SharedState = Arc<AppState>;
