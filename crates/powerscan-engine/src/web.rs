//! HTTP publisher for the live spectrum.
//!
//! Serves static assets, JSON snapshots and a chunked text stream of the
//! accumulator. Runs on its own worker thread with a current-thread tokio
//! runtime; `stop()` shuts the server down cooperatively and joins the
//! thread.

use std::io;
use std::net::Ipv4Addr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing;
use bytes::Bytes;
use futures_util::stream;
use tokio::sync::oneshot;

use powerscan_core::freqs::to_mhz;

use crate::accumulator::{SharedSpectrum, SpectrumAccumulator};
use crate::plan::ScanPlan;

/// Pause between chunks of the streaming endpoint.
const CHUNK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone)]
struct AppState {
    spectrum: SharedSpectrum,
    plan: Arc<ScanPlan>,
    web_root: PathBuf,
}

pub struct Publisher {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Publisher {
    /// Spawn the HTTP server on `localhost:port`. Returns once the
    /// listener is bound, so bind failures surface before scanning starts.
    pub fn spawn(
        port: u16,
        web_root: &str,
        plan: &ScanPlan,
        spectrum: SharedSpectrum,
    ) -> io::Result<Publisher> {
        let state = AppState {
            spectrum,
            plan: Arc::new(plan.clone()),
            web_root: PathBuf::from(web_root),
        };
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<io::Result<()>>();

        let handle = thread::Builder::new()
            .name("powerscan-web".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let listener =
                        match tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
                            Ok(listener) => {
                                let _ = ready_tx.send(Ok(()));
                                listener
                            }
                            Err(err) => {
                                let _ = ready_tx.send(Err(err));
                                return;
                            }
                        };

                    tracing::info!("spectrum published on http://127.0.0.1:{}/", port);
                    let serve = axum::serve(listener, router(state))
                        .with_graceful_shutdown(async move {
                            let _ = stop_rx.await;
                        });
                    if let Err(err) = serve.await {
                        tracing::error!("web server error: {}", err);
                    }
                });
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Publisher {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(io::Error::other("web server thread died during startup"))
            }
        }
    }

    /// Ask the server to stop and wait for the thread to finish.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(get_root))
        .route("/plan.json", routing::get(get_plan))
        .route("/spectrum.json", routing::get(get_spectrum))
        .route("/chunked", routing::get(get_chunked))
        .fallback(routing::get(get_static))
        .with_state(state)
}

async fn get_root() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/index.html")], "")
}

async fn get_plan(State(state): State<AppState>) -> Response {
    axum::Json(state.plan.as_ref()).into_response()
}

async fn get_spectrum(State(state): State<AppState>) -> Response {
    let snapshot = state.spectrum.read().unwrap().snapshot();
    axum::Json(snapshot).into_response()
}

/// Keep-alive chunked stream: one summary line per interval until the
/// client goes away (the next write then fails and the stream is dropped).
async fn get_chunked(State(state): State<AppState>) -> Response {
    let chunks = stream::unfold(state, |state| async move {
        tokio::time::sleep(CHUNK_INTERVAL).await;
        let line = {
            let accumulator = state.spectrum.read().unwrap();
            summary_line(&accumulator)
        };
        Some((Ok::<Bytes, std::convert::Infallible>(Bytes::from(line)), state))
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response()
}

async fn get_static(State(state): State<AppState>, uri: Uri) -> Response {
    let relative = uri.path().trim_start_matches('/');
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return error_page(StatusCode::FORBIDDEN);
    }

    let full = state.web_root.join(relative);
    match tokio::fs::read(&full).await {
        Ok(contents) => (
            [(header::CONTENT_TYPE, mime_for(&full))],
            contents,
        )
            .into_response(),
        Err(_) => error_page(StatusCode::NOT_FOUND),
    }
}

fn summary_line(accumulator: &SpectrumAccumulator) -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
    match accumulator.peak() {
        Some((frequency, value)) => format!(
            "{} frames={} peak={:.6} @ {:.6} MHz\n",
            now,
            accumulator.accumulation_count(),
            value,
            to_mhz(frequency)
        ),
        None => format!("{} waiting for first frame\n", now),
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Minimal HTML error page showing the numeric status.
fn error_page(status: StatusCode) -> Response {
    let body = format!(
        "<html><head><title>{status}</title></head><body><h1>{}</h1></body></html>\n",
        status.as_u16()
    );
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}
