//! Shared test helpers: a scripted HTTP stub server

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use sagemaker_llm_ops::serving::{read_request, HttpResponse};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Request seen by the stub
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

/// HTTP stub answering fixed responses per `METHOD path`
pub struct StubServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    /// Start a stub; unknown routes answer 404
    pub async fn start(routes: &[(&str, &str, u16, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let table: Arc<HashMap<String, (u16, String)>> = Arc::new(
            routes
                .iter()
                .map(|(method, path, status, body)| {
                    (format!("{} {}", method, path), (*status, body.to_string()))
                })
                .collect(),
        );

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let table = Arc::clone(&table);
                let recorded = Arc::clone(&recorded);

                tokio::spawn(async move {
                    let Ok(request) = read_request(&mut stream).await else {
                        return;
                    };
                    let key = format!("{} {}", request.method, request.path);
                    recorded.lock().unwrap().push(RecordedRequest {
                        method: request.method.clone(),
                        path: request.path.clone(),
                        body: request.body.clone(),
                    });

                    let response = match table.get(&key) {
                        Some((status, body)) => {
                            HttpResponse::new(*status, "application/json", body.clone().into_bytes())
                        }
                        None => HttpResponse::not_found(),
                    };
                    let _ = stream.write_all(&response.to_bytes()).await;
                    let _ = stream.flush().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests made to one path
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// A chat completion body with an assistant reply
pub fn chat_completion_body(reply: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

/// A TCP port nothing is listening on
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
