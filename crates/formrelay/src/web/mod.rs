//! HTTP front end.
//!
//! Serves the home page, the message form and static files from the site
//! root, and relays every POST body to the message receiver as a datagram
//! before redirecting the browser back to `/`.

pub mod relay;
pub mod site;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, Level};

use crate::error::{Error, Result};
use crate::listener::{Listener, ListenerKind, ShutdownHandle};

pub use relay::RelayClient;
pub use site::{content_type_for, Document, Site, HTML_CONTENT_TYPE};

/// State shared by the request handlers.
#[derive(Debug, Clone)]
struct AppState {
    site: Arc<Site>,
    relay: RelayClient,
}

/// Build the front end's router.
///
/// - `GET /` and `GET /message` serve the fixed documents
/// - `GET` on any other path serves a file under the site root, or the
///   error document with status 404
/// - `POST` on any path relays the body and redirects to `/`
///
/// Request bodies are not size-limited: an oversized body fails at the
/// relay, and the client is still redirected.
pub fn router(site: Site, relay: RelayClient) -> Router {
    let state = AppState {
        site: Arc::new(site),
        relay,
    };

    Router::new()
        .route("/", get(home).post(forward))
        .route("/message", get(message_form).post(forward))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn home(State(state): State<AppState>) -> Response {
    send_document(&state.site, Document::Index, StatusCode::OK).await
}

async fn message_form(State(state): State<AppState>) -> Response {
    send_document(&state.site, Document::Message, StatusCode::OK).await
}

async fn fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    match method {
        Method::GET | Method::HEAD => send_static(&state.site, uri.path()).await,
        Method::POST => forward(State(state), body).await,
        _ => StatusCode::NOT_IMPLEMENTED.into_response(),
    }
}

/// Relay the body, then redirect to `/` whether or not the relay worked.
async fn forward(State(state): State<AppState>, body: Bytes) -> Response {
    info!(bytes = body.len(), "Form data received");
    if let Err(e) = state.relay.send(&body).await {
        error!("Relay to message receiver failed: {e}");
    }
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

async fn send_static(site: &Site, path: &str) -> Response {
    let Some(file) = site.resolve(path) else {
        return send_document(site, Document::Error, StatusCode::NOT_FOUND).await;
    };

    match tokio::fs::read(&file).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&file))],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to read {}: {e}", file.display());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn send_document(site: &Site, document: Document, status: StatusCode) -> Response {
    match site.read_document(document).await {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to serve document: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The HTTP listener.
#[derive(Debug)]
pub struct WebFrontEnd {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl WebFrontEnd {
    /// Bind the front end to `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: &str, site: Site, relay: RelayClient) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::bind(addr, e))?;
        let local_addr = listener.local_addr().map_err(|e| Error::bind(addr, e))?;
        debug!(%local_addr, relay = relay.target(), "HTTP front end bound");

        Ok(Self {
            listener,
            local_addr,
            router: router(site, relay),
        })
    }
}

#[async_trait::async_trait]
impl Listener for WebFrontEnd {
    fn kind(&self) -> ListenerKind {
        ListenerKind::Http
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn run(self: Box<Self>, shutdown: ShutdownHandle) -> Result<()> {
        if shutdown.should_stop() {
            return Ok(());
        }

        info!("Server started on http://{}", self.local_addr);
        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.stopped().await })
            .await
            .map_err(Error::Serve);

        if let Err(e) = &result {
            error!("HTTP server error: {e}");
        }
        info!("Server stopped");
        result
    }
}
