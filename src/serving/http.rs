//! Minimal HTTP/1.1 request and response handling
//!
//! One request per connection, `Connection: close` on every response.

use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::ServingError;

/// Largest request accepted, headers plus body
pub const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// Parsed HTTP request
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    /// Path without query string
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// First header with the given lower-case name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Response with an arbitrary status and content type
    pub fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    /// JSON response
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(
            status,
            "application/json",
            serde_json::to_vec(value).unwrap_or_default(),
        )
    }

    pub fn ok_empty_json() -> Self {
        Self::new(200, "application/json", b"{}".to_vec())
    }

    pub fn bad_request(error: &str, details: &str) -> Self {
        Self::json(400, &serde_json::json!({ "error": error, "details": details }))
    }

    pub fn not_found() -> Self {
        Self::json(404, &serde_json::json!({ "error": "Not Found" }))
    }

    pub fn method_not_allowed() -> Self {
        Self::json(405, &serde_json::json!({ "error": "Method Not Allowed" }))
    }

    pub fn service_unavailable(details: &str) -> Self {
        Self::json(503, &serde_json::json!({ "error": "Engine not ready", "details": details }))
    }

    pub fn bad_gateway(details: &str) -> Self {
        Self::json(
            502,
            &serde_json::json!({ "error": "Upstream unavailable", "details": details }),
        )
    }

    /// Serialize status line, headers and body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut response = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));

        for (key, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", key, value));
        }

        response.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        response.push_str("Connection: close\r\n");
        response.push_str("\r\n");

        let mut bytes = response.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Terminating chunk of a chunked body
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Status line and headers of a response whose body follows in chunks
pub fn chunked_head(status: u16, content_type: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        status,
        reason_phrase(status),
        content_type
    )
    .into_bytes()
}

/// Frame `data` as one chunk; empty input yields nothing
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut bytes = format!("{:x}\r\n", data.len()).into_bytes();
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(b"\r\n");
    bytes
}

/// Reason phrase for the status codes this server emits or relays
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Read one request from a stream
///
/// Keeps reading until the header block is complete and `Content-Length`
/// bytes of body have arrived.
pub async fn read_request<R>(stream: &mut R) -> Result<HttpRequest, ServingError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }
        if buffer.len() > MAX_REQUEST_BYTES {
            return Err(ServingError::MalformedRequest("Header block too large".to_string()));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ServingError::MalformedRequest(
                "Connection closed before end of headers".to_string(),
            ));
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let mut request = parse_head(&buffer[..header_end])?;

    let content_length = match request.header("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ServingError::MalformedRequest(format!("Invalid Content-Length: {}", raw)))?,
        None => 0,
    };

    let end = header_end
        .checked_add(content_length)
        .filter(|end| *end <= MAX_REQUEST_BYTES)
        .ok_or_else(|| ServingError::MalformedRequest("Request body too large".to_string()))?;

    while buffer.len() < end {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ServingError::MalformedRequest(
                "Connection closed before end of body".to_string(),
            ));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    request.body = buffer[header_end..end].to_vec();
    Ok(request)
}

fn parse_head(head: &[u8]) -> Result<HttpRequest, ServingError> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.lines();

    let request_line = lines
        .next()
        .ok_or_else(|| ServingError::MalformedRequest("Empty request".to_string()))?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();

    if parts.len() < 2 {
        return Err(ServingError::MalformedRequest("Invalid request line".to_string()));
    }

    let method = parts[0].to_string();
    let path = parts[1].split('?').next().unwrap_or("/").to_string();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    Ok(HttpRequest {
        method,
        path,
        headers,
        body: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_request_with_body() {
        let raw = b"POST /invocations?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
        let mut stream = &raw[..];

        let request = read_request(&mut stream).await.unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/invocations");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body, b"{}");
    }

    #[tokio::test]
    async fn test_read_request_truncated_body() {
        let raw = b"POST /invocations HTTP/1.1\r\nContent-Length: 10\r\n\r\n{}";
        let mut stream = &raw[..];

        assert!(read_request(&mut stream).await.is_err());
    }

    #[tokio::test]
    async fn test_read_request_rejects_huge_content_length() {
        let raw = b"POST /invocations HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n{}";
        let mut stream = &raw[..];

        match read_request(&mut stream).await {
            Err(ServingError::MalformedRequest(msg)) => assert_eq!(msg, "Request body too large"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_request_rejects_body_over_limit() {
        let raw = format!(
            "POST /invocations HTTP/1.1\r\nContent-Length: {}\r\n\r\n{{}}",
            MAX_REQUEST_BYTES
        );
        let mut stream = raw.as_bytes();

        assert!(matches!(
            read_request(&mut stream).await,
            Err(ServingError::MalformedRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_read_request_without_body() {
        let raw = b"GET /ping HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut stream = &raw[..];

        let request = read_request(&mut stream).await.unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/ping");
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_http_response_to_bytes() {
        let response = HttpResponse::ok_empty_json();
        let bytes = response.to_bytes();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/json"));
        assert!(text.contains("Content-Length: 2"));
        assert!(text.ends_with("\r\n\r\n{}"));
    }

    #[test]
    fn test_chunked_framing() {
        let head = String::from_utf8(chunked_head(200, "text/event-stream")).unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!head.contains("Content-Length"));
        assert!(head.ends_with("\r\n\r\n"));

        let data = vec![b'x'; 26];
        let chunk = encode_chunk(&data);
        assert!(chunk.starts_with(b"1a\r\n"));
        assert!(chunk.ends_with(b"x\r\n"));
        assert!(encode_chunk(b"").is_empty());
    }

    #[test]
    fn test_bad_request_body() {
        let response = HttpResponse::bad_request("Invalid request format", "missing field `messages`");
        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(value["error"], "Invalid request format");
        assert_eq!(value["details"], "missing field `messages`");
    }
}
