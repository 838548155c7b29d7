use std::future::Future;
use std::net::SocketAddr;

use actix_web::{
    get,
    http::StatusCode,
    middleware::{Compress, Logger},
    post, put, web, App, HttpResponse, HttpServer, Responder, ResponseError,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use walletmetrics_analytics::TrackedEvent;
use walletmetrics_reporter::Disposition;

use crate::{AppState, SharedState};

#[derive(OpenApi)]
#[openapi(paths(
    crate::server::report,
    crate::server::get_consent,
    crate::server::set_consent,
    crate::server::deferred,
    crate::server::replay,
))]
pub struct ApiDoc;

pub async fn run<B: Into<SocketAddr>>(state: SharedState, bind: B) -> Result<(), anyhow::Error> {
    let addr = bind.into();
    log::debug!("listening on {}", addr);
    HttpServer::new(move || App::new().app_data(web::Data::from(state.clone())).configure(config))
        .bind(addr)?
        .run()
        .await?;
    Ok(())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(
                web::JsonConfig::default().error_handler(|err, _req| Error::InvalidEvent(err.to_string()).into()),
            )
            .wrap(Logger::default())
            .wrap(Compress::default())
            .service(report)
            .service(get_consent)
            .service(set_consent)
            .service(deferred)
            .service(replay),
    )
    .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/openapi.json", ApiDoc::openapi()));
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInformation {
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

#[derive(Debug, Display)]
enum Error {
    #[display(fmt = "Invalid event: {}", _0)]
    InvalidEvent(String),
    #[display(fmt = "Storage error: {}", _0)]
    Storage(anyhow::Error),
    #[display(fmt = "Internal error: {}", _0)]
    Internal(anyhow::Error),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error, details) = match self {
            Self::InvalidEvent(details) => ("InvalidEvent", details.clone()),
            Self::Storage(err) => ("Storage", format!("{err:#}")),
            Self::Internal(err) => ("Internal", format!("{err:#}")),
        };

        HttpResponse::build(self.status_code()).json(ErrorInformation {
            error: error.into(),
            message: self.to_string(),
            details,
        })
    }
}

/// Run a store operation on its own task, so a client going away can't cancel it halfway.
async fn detached<T, F>(operation: F) -> Result<T, Error>
where
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|err| Error::Internal(err.into()))?
        .map_err(Error::Storage)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub disposition: Disposition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    pub opt_in: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConsent {
    pub opt_in: bool,
}

/// Report a tracked event
#[utoipa::path(
    post,
    tag = "walletmetrics",
    path = "/api/v1/event",
    responses(
        (status = 200, description = "Event sent or deferred"),
        (status = BAD_REQUEST, description = "Event has no name"),
    ),
)]
#[post("/event")]
async fn report(state: web::Data<AppState>, event: web::Json<TrackedEvent>) -> actix_web::Result<impl Responder> {
    let event = event.into_inner();
    if event.name().trim().is_empty() {
        return Err(Error::InvalidEvent("event name must not be empty".into()).into());
    }

    let disposition = state
        .reporter
        .report_detached(event)
        .await
        .map_err(|err| Error::Internal(err.into()))?;
    Ok(HttpResponse::Ok().json(ReportResponse { disposition }))
}

/// Get the metrics consent of the user
#[utoipa::path(
    get,
    tag = "walletmetrics",
    path = "/api/v1/consent",
    responses(
        (status = 200, description = "Current consent, null if never asked"),
    ),
)]
#[get("/consent")]
async fn get_consent(state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    let opt_in = state.reporter.consent().await.map_err(Error::Storage)?;
    Ok(HttpResponse::Ok().json(Consent { opt_in }))
}

/// Set the metrics consent of the user, granting it replays deferred events
#[utoipa::path(
    put,
    tag = "walletmetrics",
    path = "/api/v1/consent",
    responses(
        (status = 204, description = "Consent updated"),
    ),
)]
#[put("/consent")]
async fn set_consent(state: web::Data<AppState>, consent: web::Json<SetConsent>) -> actix_web::Result<impl Responder> {
    let reporter = state.reporter.clone();
    if consent.opt_in {
        let summary = detached(async move { reporter.grant_consent().await }).await?;
        log::info!(
            "Replayed {} deferred events ({} remaining)",
            summary.sent,
            summary.remaining
        );
    } else {
        detached(async move { reporter.revoke_consent().await }).await?;
    }

    Ok(HttpResponse::NoContent().finish())
}

/// List events waiting for consent
#[utoipa::path(
    get,
    tag = "walletmetrics",
    path = "/api/v1/deferred",
    responses(
        (status = 200, description = "Deferred events, oldest first"),
    ),
)]
#[get("/deferred")]
async fn deferred(state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    let events = state.reporter.deferred_events().await.map_err(Error::Storage)?;
    Ok(HttpResponse::Ok().json(events))
}

/// Forward deferred events, if consent was granted
#[utoipa::path(
    post,
    tag = "walletmetrics",
    path = "/api/v1/replay",
    responses(
        (status = 200, description = "Number of delivered and remaining deferred events"),
    ),
)]
#[post("/replay")]
async fn replay(state: web::Data<AppState>) -> actix_web::Result<impl Responder> {
    let reporter = state.reporter.clone();
    let summary = detached(async move { reporter.replay().await }).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[cfg(test)]
mod test {
    use super::*;
    use actix_web::test::{self, TestRequest};
    use prometheus::Registry;
    use serde_json::json;
    use std::sync::Arc;
    use walletmetrics_analytics::Tracker;
    use walletmetrics_preferences::MemoryPreferences;
    use walletmetrics_reporter::deferred::MemoryDeferredStore;
    use walletmetrics_reporter::{ConsentGatedReporter, ReplaySummary, ReporterMetrics};

    fn state() -> Arc<AppState> {
        let _ = env_logger::builder().is_test(true).try_init();

        let reporter = ConsentGatedReporter::new(
            Arc::new(MemoryPreferences::new()),
            Arc::new(Tracker::disabled()),
            Arc::new(MemoryDeferredStore::new()),
            ReporterMetrics::register(&Registry::new()).unwrap(),
        );
        Arc::new(AppState::new(reporter))
    }

    #[actix_web::test]
    async fn report_defers_then_replays() -> Result<(), anyhow::Error> {
        let app = test::init_service(App::new().app_data(web::Data::from(state())).configure(config)).await;

        let request = TestRequest::get().uri("/api/v1/consent").to_request();
        let consent: Consent = test::call_and_read_body_json(&app, request).await;
        assert_eq!(consent, Consent { opt_in: None });

        let request = TestRequest::post()
            .uri("/api/v1/event")
            .set_json(json!({
                "name": "Welcome Screen Engagement",
                "properties": { "message_title": "Title1" }
            }))
            .to_request();
        let response: ReportResponse = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response.disposition, Disposition::Deferred);

        let request = TestRequest::get().uri("/api/v1/deferred").to_request();
        let events: Vec<TrackedEvent> = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            events,
            vec![TrackedEvent::new("Welcome Screen Engagement").with_property("message_title", "Title1")]
        );

        let request = TestRequest::put()
            .uri("/api/v1/consent")
            .set_json(json!({ "optIn": true }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let request = TestRequest::get().uri("/api/v1/deferred").to_request();
        let events: Vec<TrackedEvent> = test::call_and_read_body_json(&app, request).await;
        assert!(events.is_empty());

        let request = TestRequest::post()
            .uri("/api/v1/event")
            .set_json(json!({ "name": "Onboarding Started" }))
            .to_request();
        let response: ReportResponse = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response.disposition, Disposition::Sent);

        let request = TestRequest::post().uri("/api/v1/replay").to_request();
        let summary: ReplaySummary = test::call_and_read_body_json(&app, request).await;
        assert_eq!(summary, ReplaySummary::default());

        Ok(())
    }

    #[actix_web::test]
    async fn reject_empty_name() {
        let app = test::init_service(App::new().app_data(web::Data::from(state())).configure(config)).await;

        let request = TestRequest::post()
            .uri("/api/v1/event")
            .set_json(json!({ "name": "  " }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorInformation = test::read_body_json(response).await;
        assert_eq!(error.error, "InvalidEvent");
    }

    #[actix_web::test]
    async fn reject_invalid_property() {
        let app = test::init_service(App::new().app_data(web::Data::from(state())).configure(config)).await;

        let request = TestRequest::post()
            .uri("/api/v1/event")
            .set_json(json!({ "name": "foo", "properties": { "flag": true } }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorInformation = test::read_body_json(response).await;
        assert_eq!(error.error, "InvalidEvent");

        let request = TestRequest::get().uri("/api/v1/deferred").to_request();
        let events: Vec<TrackedEvent> = test::call_and_read_body_json(&app, request).await;
        assert!(events.is_empty());
    }
}
