//! HTTP front end for synthesis runs.
//!
//! Three routes: `GET /v1/bindings` describes the loaded environment,
//! `POST /v1/synthesize` runs a search for one held-out binding and answers
//! when it finishes, and `GET /v1/synthesize/ws` upgrades to a WebSocket
//! that streams one frame per examined candidate, with a closing frame
//! carrying the outcome. Searches are synchronous, so they run on blocking
//! threads; the trace stream crosses back into async land through a bounded
//! channel, which also throttles the search to the pace of a slow client.

use std::sync::Arc;

use axum::extract::Query;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{get, post},
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use tower_http::cors::{Any, CorsLayer};

use crate::bindings::Bindings;
use crate::generate;
use crate::parallel;
use crate::search::Synthesizer;

/// Everything a running service needs: the loaded bindings and the worker
/// count exhaustive requests fan out over.
pub struct SynthesisService {
    pub bindings: Bindings,
    pub workers: usize,
}

// ------------- Wire types -------------

#[derive(Deserialize)]
pub struct SynthesizeRequest {
    /// Name of the binding to reproduce; it is held out of the environment
    /// for the run.
    pub target: String,
    /// Search the whole stream concurrently and report every matching
    /// program instead of stopping at the first.
    #[serde(default)]
    pub exhaustive: bool,
}

#[derive(Serialize)]
pub struct SynthesizeResponse {
    pub status: String,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub programs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct BindingsResponse {
    pub bindings: Vec<BindingSummary>,
}

#[derive(Serialize)]
pub struct BindingSummary {
    pub name: String,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
}

#[derive(Deserialize)]
pub struct TraceParams {
    pub target: String,
}

/// One WebSocket frame: an attempt while the search runs, or the closing
/// frame, which sets `status` (and `program` on success).
#[derive(Serialize)]
pub struct ProgressFrame {
    pub ordinal: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum SearchOutcome {
    First {
        program: Option<String>,
        attempts: usize,
    },
    All(Vec<String>),
}

// ------------- Router -------------

pub fn router(service: Arc<SynthesisService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);
    let for_bindings = Arc::clone(&service);
    let for_synthesize = Arc::clone(&service);
    let for_trace = service;
    Router::new()
        .route(
            "/v1/bindings",
            get(move || {
                let service = Arc::clone(&for_bindings);
                async move { describe_bindings(&service.bindings) }
            }),
        )
        .route(
            "/v1/synthesize",
            post(move |Json(req): Json<SynthesizeRequest>| {
                let service = Arc::clone(&for_synthesize);
                async move { synthesize(service, req).await }
            }),
        )
        .route(
            "/v1/synthesize/ws",
            get(move |ws: WebSocketUpgrade, Query(params): Query<TraceParams>| {
                let service = Arc::clone(&for_trace);
                async move {
                    ws.on_upgrade(move |socket| stream_attempts(socket, service, params.target))
                }
            }),
        )
        .layer(cors)
}

// ------------- Handlers -------------

fn describe_bindings(bindings: &Bindings) -> (StatusCode, Json<BindingsResponse>) {
    let bindings = bindings
        .iter()
        .map(|(name, frame)| BindingSummary {
            name: name.to_owned(),
            rows: frame.row_count(),
            crs: frame.crs().map(str::to_owned),
            geometry: frame.geometry_column().map(str::to_owned),
            columns: frame
                .columns()
                .iter()
                .map(|column| ColumnSummary {
                    name: column.name.clone(),
                    dtype: column.dtype.to_string(),
                })
                .collect(),
        })
        .collect();
    (StatusCode::OK, Json(BindingsResponse { bindings }))
}

async fn synthesize(
    service: Arc<SynthesisService>,
    req: SynthesizeRequest,
) -> Result<(StatusCode, Json<SynthesizeResponse>), (StatusCode, &'static str)> {
    let started = std::time::Instant::now();
    let Some((inputs, goal)) = service.bindings.holdout(&req.target) else {
        warn!(target = %req.target, "synthesis request for unknown binding");
        let body = SynthesizeResponse {
            status: "error".into(),
            elapsed_ms: 0.0,
            program: None,
            programs: None,
            attempts: None,
            error: Some(format!("unknown binding: {}", req.target)),
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)));
    };
    let exhaustive = req.exhaustive;
    let workers = service.workers;
    // The search is synchronous; run it on a blocking thread.
    let outcome = tokio::task::spawn_blocking(move || {
        if exhaustive {
            let found =
                parallel::match_all(generate::programs(&inputs), &inputs, &goal, workers);
            let mut programs: Vec<String> = found.into_iter().collect();
            programs.sort();
            SearchOutcome::All(programs)
        } else {
            let synthesizer = Synthesizer::new(&inputs, &goal);
            let mut attempts = 0;
            let mut program = None;
            for attempt in synthesizer.traced() {
                attempts = attempt.ordinal;
                if attempt.matched {
                    program = Some(attempt.candidate.to_string());
                }
            }
            SearchOutcome::First { program, attempts }
        }
    })
    .await
    .map_err(|e| {
        warn!(error = %e, "Join error");
        (StatusCode::INTERNAL_SERVER_ERROR, "Join error")
    })?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let body = match outcome {
        SearchOutcome::First { program, attempts } => {
            info!(ms = elapsed_ms, target = %req.target, attempts, found = program.is_some(), "synthesis complete");
            SynthesizeResponse {
                status: if program.is_some() { "found" } else { "not_found" }.into(),
                elapsed_ms,
                program,
                programs: None,
                attempts: Some(attempts),
                error: None,
            }
        }
        SearchOutcome::All(programs) => {
            info!(ms = elapsed_ms, target = %req.target, matches = programs.len(), "exhaustive synthesis complete");
            SynthesizeResponse {
                status: "ok".into(),
                elapsed_ms,
                program: None,
                programs: Some(programs),
                attempts: None,
                error: None,
            }
        }
    };
    Ok((StatusCode::OK, Json(body)))
}

async fn stream_attempts(socket: WebSocket, service: Arc<SynthesisService>, target: String) {
    let (mut sink, _requests) = socket.split();
    let Some((inputs, goal)) = service.bindings.holdout(&target) else {
        let frame = ProgressFrame {
            ordinal: 0,
            candidate: None,
            matched: false,
            status: Some("error".into()),
            program: None,
            error: Some(format!("unknown binding: {}", target)),
        };
        if let Ok(text) = serde_json::to_string(&frame) {
            let _ = sink.send(Message::Text(text)).await;
        }
        return;
    };
    // Bounded channel: a slow client backpressures the search thread.
    let (tx, rx) = mpsc::channel::<ProgressFrame>(64);
    let search = tokio::task::spawn_blocking(move || {
        let synthesizer = Synthesizer::new(&inputs, &goal);
        let mut attempts = 0;
        let mut program = None;
        for attempt in synthesizer.traced() {
            attempts = attempt.ordinal;
            if attempt.matched {
                program = Some(attempt.candidate.to_string());
            }
            let frame = ProgressFrame {
                ordinal: attempt.ordinal,
                candidate: Some(attempt.candidate.to_string()),
                matched: attempt.matched,
                status: None,
                program: None,
                error: None,
            };
            if tx.blocking_send(frame).is_err() {
                // Client went away; stop searching.
                return;
            }
        }
        let closing = ProgressFrame {
            ordinal: attempts,
            candidate: None,
            matched: program.is_some(),
            status: Some(if program.is_some() { "found" } else { "not_found" }.into()),
            program,
            error: None,
        };
        let _ = tx.blocking_send(closing);
    });
    let mut frames = ReceiverStream::new(rx);
    while let Some(frame) = frames.next().await {
        let Ok(text) = serde_json::to_string(&frame) else {
            break;
        };
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    if let Err(error) = search.await {
        warn!(%error, "trace worker failed");
    }
}
