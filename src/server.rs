//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()` — no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Set `terminationGracePeriodSeconds` in your pod spec to a value longer
//! than your slowest request. 30 s is a reasonable default for most APIs.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::dispatcher::Dispatcher;
use crate::error::{BoxError, Error};
use crate::handler::Exchange;
use crate::method::Method;
use crate::request::{Body, Request};

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use ruta::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through
    /// `dispatcher`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // Wrap the dispatcher in Arc so it can be shared across concurrent
        // connection tasks without copying the entire route table.
        let dispatcher = Arc::new(dispatcher);

        info!(addr = %self.addr, routes = dispatcher.route_count(), "ruta listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        // Pin the shutdown future so we can poll it in a loop.
        // Futures in Rust must not move in memory after the first poll — that
        // is what `Pin` enforces. `tokio::pin!` pins the future on the stack.
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom instead of
                // randomly. We check shutdown first so a SIGTERM immediately
                // stops accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the hyper
                    // IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` turns a plain async function into a
                        // hyper `Service`. The closure is called once per
                        // request on the connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move { dispatch(dispatcher, req).await }
                        });

                        // `auto::Builder` transparently handles both HTTP/1.1
                        // and HTTP/2 — whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection to finish before we return.
        while tasks.join_next().await.is_some() {}

        info!("ruta stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: decodes one hyper request, runs it through the dispatcher,
/// and encodes the response.
///
/// The error type is [`Infallible`](std::convert::Infallible) — all failures
/// are handled inside the pipeline (404, 400, 500, …) so hyper never sees an
/// error. A method outside the routing vocabulary is answered with `405`
/// before the route table is consulted.
async fn dispatch(
    dispatcher: Arc<Dispatcher>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        let mut response = http::Response::new(http_body_util::Full::new(bytes::Bytes::new()));
        *response.status_mut() = http::StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    };

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let headers = req.headers().clone();

    // The body stays a stream here; buffering and limits belong to the
    // matched route's middleware chain.
    let body = Body::Stream(
        req.into_body()
            .map_err(|e| Box::new(e) as BoxError)
            .boxed_unsync(),
    );

    let request = Request::new(method, &path_and_query, headers, body);
    let ex = dispatcher.dispatch(Exchange::new(request)).await;

    Ok(ex.response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` is a future that never resolves — on non-Unix platforms
    // the SIGTERM arm is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
