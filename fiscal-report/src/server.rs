//! # server: HTTP intake for form submissions
//!
//! `POST /api/submit` takes a multipart form with a `payload` part (the form
//! JSON as text) and an optional `certificado` file part. The handler answers
//! `{"ok": true}` right away and processes the submission on a detached task;
//! whatever happens afterwards (bad JSON, Drive or SMTP failures) is only
//! logged.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use fiscal_report_core::contract::Attachment;
use fiscal_report_core::distribute::Pipeline;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const SUBMIT_PATH: &str = "/api/submit";
const PAYLOAD_FIELD: &str = "payload";
const CERTIFICATE_FIELD: &str = "certificado";

#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
}

pub fn router(pipeline: Pipeline) -> Router {
    Router::new()
        .route(SUBMIT_PATH, post(submit))
        // Submissions are accepted whole, whatever the certificate size.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { pipeline })
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(addr: SocketAddr, pipeline: Pipeline) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, path = SUBMIT_PATH, "Intake service listening");
    axum::serve(listener, router(pipeline))
        .await
        .context("HTTP server stopped unexpectedly")
}

/// The parts of one submission request.
#[derive(Debug, Default)]
struct Intake {
    payload: Option<String>,
    certificate: Option<Attachment>,
}

async fn read_parts(mut multipart: Multipart) -> Intake {
    let mut intake = Intake::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Malformed multipart body; keeping parts read so far");
                break;
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            PAYLOAD_FIELD => match field.text().await {
                Ok(text) => intake.payload = Some(text),
                Err(e) => warn!(error = %e, "Could not read payload part"),
            },
            CERTIFICATE_FIELD => {
                let filename = field.file_name().unwrap_or(CERTIFICATE_FIELD).to_string();
                let content_type = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => {
                        intake.certificate = Some(Attachment {
                            filename,
                            content: bytes.to_vec(),
                            content_type,
                        })
                    }
                    Err(e) => warn!(error = %e, "Could not read certificate part"),
                }
            }
            other => warn!(field = other, "Ignoring unexpected multipart field"),
        }
    }
    intake
}

async fn submit(State(state): State<AppState>, multipart: Multipart) -> Json<Value> {
    let intake = read_parts(multipart).await;
    info!(
        payload_bytes = intake.payload.as_ref().map(String::len),
        certificate = intake.certificate.is_some(),
        "Submission received"
    );

    tokio::spawn(async move {
        let Some(payload) = intake.payload else {
            error!("Submission without a payload part; nothing to process");
            return;
        };
        let as_of = chrono::Utc::now().date_naive();
        match state
            .pipeline
            .process(&payload, intake.certificate, as_of)
            .await
        {
            Ok(outcome) if outcome.all_succeeded() => {
                info!(submission_id = %outcome.submission_id, "Submission distributed")
            }
            Ok(outcome) => {
                warn!(submission_id = %outcome.submission_id, ?outcome, "Submission partially distributed")
            }
            Err(e) => error!(error = %e, "Submission could not be processed"),
        }
    });

    Json(json!({ "ok": true }))
}
