//! SageMaker container HTTP front
//!
//! Exposes the two routes SageMaker calls on a serving container and relays
//! inference to an OpenAI-compatible engine:
//! - GET /ping - `200 {}` once the engine answers `<upstream>/health`, 503 before
//! - POST /invocations - Chat completion, forwarded to `<upstream>/v1/chat/completions`
//!
//! Streaming completions are relayed chunk by chunk as they arrive.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::ServingError;
use super::http::{chunked_head, encode_chunk, read_request, HttpRequest, HttpResponse, LAST_CHUNK};
use crate::chat::ChatCompletionRequest;

/// Path of the chat completion route on the engine
pub const UPSTREAM_CHAT_PATH: &str = "/v1/chat/completions";

/// Path of the engine's own health route
pub const UPSTREAM_HEALTH_PATH: &str = "/health";

/// Timeout of the engine health check behind `/ping`
pub const ENGINE_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Adapter options
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Model name filled into requests that omit `model`
    pub served_model_name: String,
    /// Engine base URL, e.g. `http://127.0.0.1:8000`
    pub upstream: String,
    /// Timeout of one forwarded request
    pub request_timeout: Duration,
}

struct Router {
    client: Client,
    chat_url: String,
    health_url: String,
    served_model_name: String,
}

impl Router {
    fn new(client: Client, upstream: &str, served_model_name: String) -> Self {
        let upstream = upstream.trim_end_matches('/');
        Self {
            client,
            chat_url: format!("{}{}", upstream, UPSTREAM_CHAT_PATH),
            health_url: format!("{}{}", upstream, UPSTREAM_HEALTH_PATH),
            served_model_name,
        }
    }
}

/// What to send back on a connection
enum Reply {
    Buffered(HttpResponse),
    /// Engine response relayed with chunked transfer encoding
    Streamed {
        status: u16,
        request_id: Uuid,
        upstream: reqwest::Response,
    },
}

impl Reply {
    #[cfg(test)]
    fn status(&self) -> u16 {
        match self {
            Reply::Buffered(response) => response.status,
            Reply::Streamed { status, .. } => *status,
        }
    }
}

impl From<HttpResponse> for Reply {
    fn from(response: HttpResponse) -> Self {
        Reply::Buffered(response)
    }
}

/// Bound, not yet running, adapter
pub struct SageMakerServer {
    listener: TcpListener,
    router: Arc<Router>,
}

impl SageMakerServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, options: ServeOptions) -> Result<Self, ServingError> {
        let client = Client::builder().timeout(options.request_timeout).build()?;
        let listener = TcpListener::bind(addr).await?;

        let router = Arc::new(Router::new(client, &options.upstream, options.served_model_name));

        Ok(Self { listener, router })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, ServingError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServingError>
    where
        F: Future<Output = ()>,
    {
        info!(addr = %self.local_addr()?, upstream = %self.router.chat_url, "SageMaker adapter listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, remote_addr) = accepted?;
                    let router = Arc::clone(&self.router);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, router, remote_addr).await {
                            error!("Connection error from {}: {}", remote_addr, e);
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    router: Arc<Router>,
    remote_addr: SocketAddr,
) -> Result<(), ServingError> {
    let reply = match read_request(&mut stream).await {
        Ok(request) => {
            debug!(
                method = %request.method,
                path = %request.path,
                remote = %remote_addr,
                "Incoming request"
            );
            route_request(&router, request).await
        }
        Err(ServingError::MalformedRequest(msg)) => {
            HttpResponse::bad_request("Malformed request", &msg).into()
        }
        Err(e) => return Err(e),
    };

    match reply {
        Reply::Buffered(response) => stream.write_all(&response.to_bytes()).await?,
        Reply::Streamed {
            status,
            request_id,
            mut upstream,
        } => {
            stream.write_all(&chunked_head(status, "text/event-stream")).await?;

            let mut relayed = 0usize;
            loop {
                match upstream.chunk().await {
                    Ok(Some(bytes)) => {
                        relayed += bytes.len();
                        stream.write_all(&encode_chunk(&bytes)).await?;
                        stream.flush().await?;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // Headers are already out; end the stream early
                        warn!(%request_id, error = %e, "Engine stream failed");
                        break;
                    }
                }
            }

            debug!(%request_id, status, bytes = relayed, "Engine stream finished");
            stream.write_all(LAST_CHUNK).await?;
        }
    }

    stream.flush().await?;
    Ok(())
}

async fn route_request(router: &Router, request: HttpRequest) -> Reply {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/ping") => check_engine(router).await.into(),
        ("POST", "/invocations") => handle_invocations(router, &request.body).await,
        (_, "/ping") | (_, "/invocations") => HttpResponse::method_not_allowed().into(),
        _ => HttpResponse::not_found().into(),
    }
}

/// Healthy only when the engine's own health route answers 2xx
async fn check_engine(router: &Router) -> HttpResponse {
    let result = router
        .client
        .get(&router.health_url)
        .timeout(ENGINE_HEALTH_TIMEOUT)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => HttpResponse::ok_empty_json(),
        Ok(response) => {
            let status = response.status().as_u16();
            debug!(status, "Engine health check not ready");
            HttpResponse::service_unavailable(&format!("engine health returned {}", status))
        }
        Err(e) => {
            debug!(error = %e, "Engine health check unreachable");
            HttpResponse::service_unavailable(&e.to_string())
        }
    }
}

async fn handle_invocations(router: &Router, body: &[u8]) -> Reply {
    let mut request = match ChatCompletionRequest::parse(body) {
        Ok(r) => r,
        Err(details) => return HttpResponse::bad_request("Invalid request format", &details).into(),
    };

    if request.model.is_none() {
        request.model = Some(router.served_model_name.clone());
    }

    let request_id = Uuid::new_v4();
    let streaming = request.is_streaming();
    info!(%request_id, streaming, messages = request.messages.len(), "Forwarding invocation");

    let upstream = match router.client.post(&router.chat_url).json(&request).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(%request_id, error = %e, "Engine request failed");
            return HttpResponse::bad_gateway(&e.to_string()).into();
        }
    };

    let status = upstream.status().as_u16();

    if streaming && upstream.status().is_success() {
        return Reply::Streamed {
            status,
            request_id,
            upstream,
        };
    }

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    match upstream.bytes().await {
        Ok(bytes) => {
            debug!(%request_id, status, bytes = bytes.len(), "Engine responded");
            HttpResponse::new(status, &content_type, bytes.to_vec()).into()
        }
        Err(e) => {
            warn!(%request_id, error = %e, "Engine response body failed");
            HttpResponse::bad_gateway(&e.to_string()).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_for(upstream: &str) -> Router {
        Router::new(Client::new(), upstream, "served-model".to_string())
    }

    fn request(method: &str, path: &str, body: &[u8]) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: body.to_vec(),
        }
    }

    fn buffered(reply: Reply) -> HttpResponse {
        match reply {
            Reply::Buffered(response) => response,
            Reply::Streamed { status, .. } => panic!("unexpected stream with status {status}"),
        }
    }

    #[test]
    fn test_router_urls() {
        let router = router_for("http://127.0.0.1:8000/");
        assert_eq!(router.chat_url, "http://127.0.0.1:8000/v1/chat/completions");
        assert_eq!(router.health_url, "http://127.0.0.1:8000/health");
    }

    #[tokio::test]
    async fn test_ping_is_unavailable_while_engine_is_down() {
        let router = router_for("http://127.0.0.1:9");
        let response = buffered(route_request(&router, request("GET", "/ping", b"")).await);

        assert_eq!(response.status, 503);
        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(value["error"], "Engine not ready");
    }

    #[tokio::test]
    async fn test_routing_errors() {
        let router = router_for("http://127.0.0.1:9");

        assert_eq!(route_request(&router, request("POST", "/ping", b"")).await.status(), 405);
        assert_eq!(route_request(&router, request("GET", "/invocations", b"")).await.status(), 405);
        assert_eq!(route_request(&router, request("GET", "/health", b"")).await.status(), 404);
    }

    #[tokio::test]
    async fn test_invalid_invocation_is_rejected() {
        let router = router_for("http://127.0.0.1:9");
        let response = buffered(
            route_request(&router, request("POST", "/invocations", b"{\"prompt\":1}")).await,
        );

        assert_eq!(response.status, 400);
        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(value["error"], "Invalid request format");
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_bad_gateway() {
        let router = router_for("http://127.0.0.1:9");
        let body = br#"{"messages":[{"role":"user","content":"hi"}]}"#;
        let reply = route_request(&router, request("POST", "/invocations", body)).await;

        assert_eq!(reply.status(), 502);
    }
}
