use crate::config::schema::ServerConfig;
use crate::control::Command;
use crate::error::{KioskError, Result};
use crate::hub::message::WireMessage;
use crate::hub::{ViewerId, VIEWER_QUEUE};
use crate::launch;
use crate::media::MEDIA_ROUTE;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{debug, info, warn};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const INDEX_JS: &str = include_str!("../../web/index.js");

#[derive(Clone)]
struct AppState {
    cmd_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

pub fn router(
    media_dir: &Path,
    cmd_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index.js", get(script))
        .route("/ws", get(ws_upgrade))
        .nest_service(&format!("/{MEDIA_ROUTE}"), ServeDir::new(media_dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .with_state(AppState { cmd_tx, cancel })
}

/// Bind, launch the kiosk browser if configured, and serve until `cancel`.
///
/// # Errors
/// Returns `KioskError::Server` if the address can't be bound or the server
/// fails while running.
pub async fn serve(
    config: ServerConfig,
    media_dir: PathBuf,
    cmd_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|e| KioskError::Server(format!("bind {}: {e}", config.bind)))?;
    let addr = listener.local_addr()?;
    info!("serving {} on http://{addr}/", media_dir.display());

    let mut browser = config.browser.as_ref().and_then(|b| {
        launch::spawn_browser(b, &launch::local_url(addr.port()))
            .map_err(|e| warn!("{e}"))
            .ok()
    });

    let app = router(&media_dir, cmd_tx, cancel.clone());
    let shutdown = cancel.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    if let Some(child) = browser.as_mut() {
        launch::stop_browser(child).await;
    }
    info!("web server stopped");
    result.map_err(|e| KioskError::Server(e.to_string()))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        INDEX_JS,
    )
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| viewer_session(socket, state))
}

/// One browser viewer: register with the hub, pump its queue out as JSON
/// text frames, and unregister when either side goes away.
async fn viewer_session(socket: WebSocket, state: AppState) {
    let id = ViewerId::new();
    let (tx, mut rx) = mpsc::channel::<WireMessage>(VIEWER_QUEUE);
    if state.cmd_tx.send(Command::Connect { id, tx }).await.is_err() {
        debug!("control loop gone, refusing viewer {id}");
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        // Ends when the hub drops this viewer's sender.
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!("could not encode {msg:?}: {e}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_rx.next().await {
            match message {
                Message::Close(frame) => {
                    debug!("viewer {id} sent close {frame:?}");
                    break;
                }
                Message::Text(text) => debug!("ignoring text from viewer {id}: {text}"),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
        () = state.cancel.cancelled() => {
            reader.abort();
            writer.abort();
        }
    }

    let _ = state.cmd_tx.send(Command::Disconnect(id)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(dir: &Path) -> Router {
        let (tx, _rx) = mpsc::channel(8);
        router(dir, tx, CancellationToken::new())
    }

    async fn get_path(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body.to_vec())
    }

    #[tokio::test]
    async fn landing_page_loads_client_script() {
        let dir = tempfile::tempdir().unwrap();
        let (status, content_type, body) = get_path(app(dir.path()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert!(String::from_utf8(body).unwrap().contains("index.js"));
    }

    #[tokio::test]
    async fn client_script_is_javascript() {
        let dir = tempfile::tempdir().unwrap();
        let (status, content_type, body) = get_path(app(dir.path()), "/index.js").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/javascript"));
        assert!(String::from_utf8(body).unwrap().contains("LOAD_GIFS"));
    }

    #[tokio::test]
    async fn media_is_served_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.gif"), b"GIF89a-bytes").unwrap();

        let (status, _, body) = get_path(app(dir.path()), "/gifs/a.gif").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"GIF89a-bytes");

        let (status, _, _) = get_path(app(dir.path()), "/gifs/missing.gif").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listed_urls_resolve_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a#1 b?.gif");
        std::fs::write(&path, b"GIF89a-odd-name").unwrap();

        let urls = crate::media::MediaSet::new(vec![path])
            .unwrap()
            .relative_urls(MEDIA_ROUTE);
        assert_eq!(urls, vec!["gifs/a%231%20b%3F.gif".to_string()]);

        let (status, _, body) = get_path(app(dir.path()), &format!("/{}", urls[0])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"GIF89a-odd-name");
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _, _) = get_path(app(dir.path()), "/ws").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let config = ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            browser: None,
        };
        let handle = tokio::spawn(serve(config, dir.path().to_path_buf(), tx, cancel.clone()));
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_server_error() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            bind: held.local_addr().unwrap().to_string(),
            browser: None,
        };
        let (tx, _rx) = mpsc::channel(8);
        let dir = tempfile::tempdir().unwrap();
        let err = serve(config, dir.path().to_path_buf(), tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KioskError::Server(_)));
    }
}
