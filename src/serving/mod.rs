//! SageMaker serving adapter
//!
//! SageMaker talks to a serving container through `GET /ping` and
//! `POST /invocations`. This module provides that front for an
//! OpenAI-compatible engine, and can launch the engine itself with
//! arguments derived from [`ServingConfig`](crate::config::ServingConfig).
//!
//! ```text
//! SageMaker ──► /ping, /invocations ──► SageMakerServer ──► engine /v1/chat/completions
//! ```

mod engine;
mod error;
mod http;
mod server;

pub use engine::{default_engine_command, EngineArgs, LIMIT_MM_PER_PROMPT, MAX_MODEL_LEN};
pub use error::ServingError;
pub use http::{
    chunked_head, encode_chunk, read_request, reason_phrase, HttpRequest, HttpResponse, LAST_CHUNK,
    MAX_REQUEST_BYTES,
};
pub use server::{SageMakerServer, ServeOptions, ENGINE_HEALTH_TIMEOUT, UPSTREAM_CHAT_PATH, UPSTREAM_HEALTH_PATH};
