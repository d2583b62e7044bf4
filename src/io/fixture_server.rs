//! In-process package backend
//!
//! Serves canned responses at the same paths as the real backend:
//! - `GET /get_package/{id}` - the response registered for `id`, or
//!   `{"error": "Package not found"}` with 200 for unknown ids
//! - `HEAD /` and `GET /` - 200 by default, for reachability probes
//!
//! Responses can carry a status, a raw body, and an artificial delay, which
//! makes it usable both as a local mock backend and for exercising every
//! lookup failure mode in tests. Uses hyper for the HTTP server.

use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const PACKAGE_PATH_PREFIX: &str = "/get_package/";
const NOT_FOUND_BODY: &str = r#"{"error":"Package not found"}"#;

/// One canned response
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl FixtureResponse {
    /// 200 with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into(), delay: Duration::ZERO }
    }

    /// 200 with a serialized JSON value
    pub fn json(value: &Value) -> Self {
        Self::ok(value.to_string())
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: String::new(), delay: Duration::ZERO }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Identifier to response table
#[derive(Debug, Clone)]
pub struct FixtureRoutes {
    packages: HashMap<String, FixtureResponse>,
    fallback: FixtureResponse,
    probe: FixtureResponse,
}

impl Default for FixtureRoutes {
    fn default() -> Self {
        Self {
            packages: HashMap::new(),
            fallback: FixtureResponse::ok(NOT_FOUND_BODY),
            probe: FixtureResponse::ok(""),
        }
    }
}

impl FixtureRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, identifier: impl Into<String>, response: FixtureResponse) -> Self {
        self.packages.insert(identifier.into(), response);
        self
    }

    /// Response for `HEAD /` and `GET /`
    pub fn with_probe_response(mut self, response: FixtureResponse) -> Self {
        self.probe = response;
        self
    }

    /// Build routes from a dataset object: `{ "<id>": <record>, ... }`
    pub fn from_dataset(dataset: &Value) -> anyhow::Result<Self> {
        let entries = dataset.as_object().context("dataset must be a JSON object keyed by package id")?;
        let mut routes = Self::new();
        for (identifier, record) in entries {
            routes.packages.insert(identifier.clone(), FixtureResponse::json(record));
        }
        Ok(routes)
    }

    /// Apply a delay to every package response, including the fallback
    pub fn with_global_delay(mut self, delay: Duration) -> Self {
        for response in self.packages.values_mut() {
            response.delay = delay;
        }
        self.fallback.delay = delay;
        self
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn lookup(&self, identifier: &str) -> &FixtureResponse {
        self.packages.get(identifier).unwrap_or(&self.fallback)
    }
}

fn build_response(status: u16, body: String) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    routes: Arc<FixtureRoutes>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    debug!(method = %req.method(), path = %path, "fixture_request");

    match (req.method(), path) {
        (&Method::HEAD, "/") | (&Method::GET, "/") => {
            let response = routes.probe.clone();
            if !response.delay.is_zero() {
                tokio::time::sleep(response.delay).await;
            }
            Ok(build_response(response.status, response.body))
        }
        (&Method::GET, p) if p.starts_with(PACKAGE_PATH_PREFIX) => {
            let raw = &p[PACKAGE_PATH_PREFIX.len()..];
            let identifier = urlencoding::decode(raw).map(|s| s.into_owned()).unwrap_or_else(|_| raw.to_string());
            let response = routes.lookup(&identifier).clone();
            if !response.delay.is_zero() {
                tokio::time::sleep(response.delay).await;
            }
            Ok(build_response(response.status, response.body))
        }
        _ => Ok(build_response(404, r#"{"detail":"Not Found"}"#.to_string())),
    }
}

/// Running fixture server; stops on `shutdown` or when dropped with the runtime
pub struct FixtureServer {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    /// Bind and start serving. Use port 0 for an ephemeral port.
    pub async fn start(addr: SocketAddr, routes: FixtureRoutes) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let routes = Arc::new(routes);

        info!(addr = %addr, packages = %routes.len(), "fixture_server_started");

        let handle = tokio::spawn(serve(listener, routes, shutdown_rx));
        Ok(Self { addr, shutdown_tx, handle })
    }

    /// Start on 127.0.0.1 with an ephemeral port
    pub async fn start_local(routes: FixtureRoutes) -> std::io::Result<Self> {
        Self::start(SocketAddr::from(([127, 0, 0, 1], 0)), routes).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn serve(listener: TcpListener, routes: Arc<FixtureRoutes>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let routes = routes.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let routes = routes.clone();
                                async move { handle_request(req, routes).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!(error = %e, "fixture_connection_closed");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "fixture_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("fixture_server_shutdown");
                    return;
                }
            }
        }
    }
}
