// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP endpoint exposing the collected metrics.

use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{header, http, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error};

pub type HttpResponse = Response<Full<Bytes>>;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Serves scrapes on `listener` until accepting connections fails. With an
/// acceptor every connection completes a TLS handshake first.
pub async fn serve(
    listener: tokio::net::TcpListener,
    registry: Arc<Registry>,
    telemetry_path: Arc<str>,
    tls: Option<TlsAcceptor>,
) -> anyhow::Result<()> {
    let service = service_fn(move |req: Request<Incoming>| {
        let registry = Arc::clone(&registry);
        let telemetry_path = Arc::clone(&telemetry_path);
        async move { Ok::<_, Infallible>(handle(&req, &registry, &telemetry_path)) }
    });

    let server = hyper::server::conn::http1::Builder::new();
    let mut joinset = tokio::task::JoinSet::new();

    loop {
        let (conn, peer_addr) = tokio::select! {
            con_res = listener.accept() => match con_res {
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Server error: {e}");
                    return Err(e.into());
                }
                Ok(accepted) => accepted,
            },
            finished = async {
                match joinset.join_next().await {
                    Some(finished) => finished,
                    None => std::future::pending().await,
                }
            } => match finished {
                Err(e) if e.is_panic() => {
                    error!("Connection handler panicked: {:?}", e);
                    continue;
                },
                Ok(()) | Err(_) => continue,
            },
        };
        let server = server.clone();
        let service = service.clone();
        let tls = tls.clone();
        joinset.spawn(async move {
            let result = match tls {
                Some(acceptor) => match acceptor.accept(conn).await {
                    Ok(stream) => server.serve_connection(TokioIo::new(stream), service).await,
                    Err(e) => {
                        debug!("TLS handshake with {peer_addr} failed: {e}");
                        return;
                    }
                },
                None => server.serve_connection(TokioIo::new(conn), service).await,
            };
            if let Err(e) = result {
                error!("Connection error: {e}");
            }
        });
    }
}

/// Routes one request: the telemetry path gets the exposition, `/` a landing page.
pub fn handle<B>(req: &Request<B>, registry: &Registry, telemetry_path: &str) -> HttpResponse {
    let path = req.uri().path();
    let response = if path == telemetry_path {
        debug!("Serving scrape");
        match render(registry) {
            Ok(body) => build_response(StatusCode::OK, METRICS_CONTENT_TYPE, body),
            Err(e) => {
                error!("Failed to encode metrics: {e}");
                build_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain; charset=utf-8",
                    format!("failed to encode metrics: {e}\n"),
                )
            }
        }
    } else if path == "/" {
        build_response(
            StatusCode::OK,
            "text/html; charset=utf-8",
            landing_page(telemetry_path),
        )
    } else {
        build_response(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            "404 page not found\n".to_string(),
        )
    };
    response.unwrap_or_else(|e| {
        error!("Failed to build response for {path}: {e}");
        let mut failed = Response::new(Full::new(Bytes::new()));
        *failed.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        failed
    })
}

/// Gathers every registered collector into the text exposition format.
fn render(registry: &Registry) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

fn build_response(
    status: StatusCode,
    content_type: &str,
    body: String,
) -> http::Result<HttpResponse> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from(body)))
}

fn landing_page(telemetry_path: &str) -> String {
    format!(
        "<html>
<head><title>Rsyslog exporter</title></head>
<body>
<h1>Rsyslog exporter</h1>
<p><a href='{telemetry_path}'>Metrics</a></p>
</body>
</html>
"
    )
}
