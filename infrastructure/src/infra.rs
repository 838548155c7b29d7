use std::sync::Arc;
use std::{future::Future, pin::Pin};

use actix_web::{http::uri::Builder, middleware::Logger, web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::Context;
use futures::future::select_all;
use prometheus::{Registry, TextEncoder};
use tokio::signal;

use crate::health::{Checks, HealthChecks};
use crate::tracing::init_tracing;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

const DEFAULT_BIND_ADDR: &str = "[::1]:9010";

/// Infrastructure
#[derive(Clone, Debug, clap::Args)]
#[command(rename_all_env = "SCREAMING_SNAKE_CASE", next_help_heading = "Infrastructure")]
pub struct InfrastructureConfig {
    /// Enable the infrastructure endpoint
    #[arg(env, long)]
    pub infrastructure_enabled: bool,
    /// Bind addresses of the infrastructure endpoint
    #[arg(long, env, default_value_t = DEFAULT_BIND_ADDR.into())]
    pub infrastructure_bind: String,
    /// Number of workers
    #[arg(long, env, default_value = "1")]
    pub infrastructure_workers: usize,
    /// Enable structured tracing output
    #[arg(long, env)]
    pub enable_tracing: bool,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            infrastructure_enabled: false,
            infrastructure_bind: DEFAULT_BIND_ADDR.into(),
            infrastructure_workers: 1,
            enable_tracing: false,
        }
    }
}

/// Handed to the main function of an application run by [`Infrastructure::run`].
pub struct InitContext {
    pub metrics: Arc<Metrics>,
    pub health: Arc<HealthChecks>,
}

async fn index(req: HttpRequest) -> HttpResponse {
    let conn = req.connection_info();

    let apis = ["/health/live", "/health/ready", "/health/startup", "/metrics"]
        .into_iter()
        .filter_map(|api| {
            Builder::new()
                .authority(conn.host())
                .scheme(conn.scheme())
                .path_and_query(api)
                .build()
                .ok()
                .map(|uri| uri.to_string())
        })
        .collect::<Vec<_>>();

    HttpResponse::Ok().json(apis)
}

async fn run_checks(checks: &Checks) -> HttpResponse {
    let result = checks.run().await;
    if result.all_up() {
        HttpResponse::Ok().json(result)
    } else {
        HttpResponse::ServiceUnavailable().json(result)
    }
}

async fn startup(health: web::Data<HealthChecks>) -> HttpResponse {
    run_checks(&health.startup).await
}

async fn liveness(health: web::Data<HealthChecks>) -> HttpResponse {
    run_checks(&health.liveness).await
}

async fn readiness(health: web::Data<HealthChecks>) -> HttpResponse {
    run_checks(&health.readiness).await
}

async fn metrics(metrics: web::Data<Metrics>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();
    match encoder.encode_to_string(&metric_families) {
        Ok(data) => HttpResponse::Ok().content_type("text/plain").body(data),
        Err(e) => HttpResponse::InternalServerError().body(format!("Error retrieving metrics: {:?}", e)),
    }
}

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").to(index))
        .service(
            web::scope("/health")
                .service(web::resource("/live").to(liveness))
                .service(web::resource("/ready").to(readiness))
                .service(web::resource("/startup").to(startup)),
        )
        .service(web::resource("/metrics").to(metrics));
}

type LocalBoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>>>>;

#[derive(Default)]
pub struct Infrastructure {
    config: InfrastructureConfig,
    metrics: Arc<Metrics>,
    health: Arc<HealthChecks>,
}

impl From<InfrastructureConfig> for Infrastructure {
    fn from(config: InfrastructureConfig) -> Self {
        Self {
            config,
            metrics: Default::default(),
            health: Default::default(),
        }
    }
}

impl Infrastructure {
    /// create a new instance, with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    async fn start_internal(&self) -> anyhow::Result<LocalBoxFuture> {
        if !self.config.infrastructure_enabled {
            log::info!("Infrastructure endpoint is disabled");
            return Ok(Box::pin(futures::future::pending::<anyhow::Result<()>>()));
        }

        log::info!("Setting up infrastructure endpoint");

        let metrics = web::Data::from(self.metrics.clone());
        let health = web::Data::from(self.health.clone());

        let mut http = HttpServer::new(move || {
            App::new()
                .wrap(Logger::default())
                .app_data(metrics.clone())
                .app_data(health.clone())
                .configure(configure)
        });

        if self.config.infrastructure_workers > 0 {
            http = http.workers(self.config.infrastructure_workers);
        }

        http = http
            .bind(&self.config.infrastructure_bind)
            .context("Failed to bind infrastructure endpoint")?;

        Ok(Box::pin(async move {
            log::info!("Running infrastructure endpoint on:");
            for (addr, scheme) in http.addrs_with_scheme() {
                log::info!("   {scheme}://{addr}");
            }
            http.run().await.context("Failed to run infrastructure endpoint")?;
            Ok::<_, anyhow::Error>(())
        }))
    }

    /// Run an application until it ends, the infrastructure endpoint fails, or the process
    /// receives a termination signal.
    pub async fn run<F, Fut>(self, id: &str, main: F) -> anyhow::Result<()>
    where
        F: FnOnce(InitContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        init_tracing(id, self.config.enable_tracing.into());

        let context = InitContext {
            metrics: self.metrics.clone(),
            health: self.health.clone(),
        };

        let main = Box::pin(main(context)) as LocalBoxFuture;
        let runner = self.start_internal().await?;
        let sigint = Box::pin(async { signal::ctrl_c().await.context("termination failed") }) as LocalBoxFuture;

        #[allow(unused_mut)]
        let mut tasks = vec![runner, main, sigint];

        #[cfg(unix)]
        {
            let sigterm = Box::pin(async {
                signal(SignalKind::terminate())?.recv().await;
                Ok::<_, anyhow::Error>(())
            }) as LocalBoxFuture;
            tasks.push(sigterm);
        }

        let (result, _index, _others) = select_all(tasks).await;
        result
    }
}

#[derive(Default)]
pub struct Metrics {
    registry: Registry,
}

impl Metrics {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
