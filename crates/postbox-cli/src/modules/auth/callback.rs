use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use postbox_core::AuthError;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::modules::system::config::CALLBACK_HOST;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Page returned to the browser once a callback has been handled.
#[derive(Debug)]
pub(crate) struct CallbackReply {
    pub status: StatusCode,
    pub body: String,
}

impl CallbackReply {
    pub(crate) fn success(profile: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: page(
                "Login complete",
                &format!("Profile <b>{}</b> is ready. You can close this window.", escape(profile)),
            ),
        }
    }

    pub(crate) fn failure(reason: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: page("Login failed", &escape(reason)),
        }
    }
}

pub(crate) struct CallbackRequest {
    pub params: CallbackParams,
    pub responder: oneshot::Sender<CallbackReply>,
}

/// Local HTTP endpoint that receives the provider redirect.
///
/// Only the configured path is routed; anything else gets a 404. Callbacks
/// are handed to the owner one at a time through [`Self::next_request`].
pub(crate) struct CallbackListener {
    addr: SocketAddr,
    requests: mpsc::Receiver<CallbackRequest>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackListener {
    pub(crate) async fn bind(port: u16, path: &str) -> Result<Self, AuthError> {
        let listener = tokio::net::TcpListener::bind((CALLBACK_HOST, port))
            .await
            .map_err(|err| AuthError::ListenerBind {
                addr: format!("{CALLBACK_HOST}:{port}"),
                reason: err.to_string(),
            })?;
        let addr = listener.local_addr()?;

        let (tx, requests) = mpsc::channel(1);
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new()
            .route(path, get(handle_callback))
            .fallback(not_found)
            .with_state(tx);

        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                warn!(error = %err, "callback listener failed");
            }
        });
        info!(%addr, path, "callback listener started");

        Ok(Self {
            addr,
            requests,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) async fn next_request(&mut self) -> Option<CallbackRequest> {
        self.requests.recv().await
    }

    /// Stops accepting callbacks and waits for the server to wind down.
    pub(crate) async fn close(mut self) {
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            let _ = request
                .responder
                .send(CallbackReply::failure("This login link has already been used."));
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                debug!("callback listener did not stop in time; aborting");
                abort.abort();
            }
        }
        debug!(addr = %self.addr, "callback listener closed");
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn handle_callback(
    State(requests): State<mpsc::Sender<CallbackRequest>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (responder, reply) = oneshot::channel();
    if requests
        .send(CallbackRequest { params, responder })
        .await
        .is_err()
    {
        let reply = CallbackReply::failure("This login link has already been used.");
        return (StatusCode::GONE, Html(reply.body)).into_response();
    }
    match reply.await {
        Ok(reply) => (reply.status, Html(reply.body)).into_response(),
        Err(_) => {
            let reply = CallbackReply::failure("Login was interrupted.");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(reply.body)).into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{message}</p></body></html>"
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
