//! In-process stand-in for the VK `api.php` endpoint.
//!
//! Checks request signatures with its own implementation of the MD5 scheme
//! (so drift in the client shows up as signature errors) and answers in the
//! same envelope shapes as the real service.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Form, Router,
};
use md5::{Digest, Md5};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info};

pub const ERROR_UNKNOWN_METHOD: i64 = 3;
pub const ERROR_BAD_SIGNATURE: i64 = 4;

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// When set, every request must carry a valid `sig`.
    pub secret: Option<String>,
}

pub type Shared = Arc<MockConfig>;

pub fn app(config: MockConfig) -> Router {
    Router::new()
        .route("/api.php", post(api))
        .with_state(Arc::new(config))
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    info!(addr = ?listener.local_addr().ok(), "mock api.php listening");
    axum::serve(listener, app(config)).await
}

/// `md5(sorted k=v pairs + secret)`, lowercase hex.
pub fn sign(secret: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().filter(|(k, _)| k != "sig").collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let joined: String = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
    hex::encode(Md5::digest(format!("{joined}{secret}").as_bytes()))
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn error_envelope(code: i64, msg: &str, params: &[(String, String)]) -> Value {
    let echoed: Vec<Value> = params.iter().map(|(k, v)| json!({"key": k, "value": v})).collect();
    json!({"error": {"error_code": code, "error_msg": msg, "request_params": echoed}})
}

async fn api(State(config): State<Shared>, Form(params): Form<Vec<(String, String)>>) -> impl IntoResponse {
    let method = param(&params, "method").unwrap_or_default().to_string();
    debug!(%method, fields = params.len(), "request");

    if let Some(secret) = &config.secret {
        let expected = sign(secret, &params);
        if param(&params, "sig") != Some(expected.as_str()) {
            return json_body(error_envelope(ERROR_BAD_SIGNATURE, "Incorrect signature", &params).to_string());
        }
    }

    let body = match method.as_str() {
        "getServerTime" => {
            let ts: i64 = param(&params, "timestamp").and_then(|t| t.parse().ok()).unwrap_or_default();
            json!({"response": ts}).to_string()
        }
        "friends.get" => json!({"response": [1, 2, 3]}).to_string(),
        "echo" => {
            let fields: serde_json::Map<String, Value> = params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            json!({"response": fields}).to_string()
        }
        // The real service sometimes writes stale error envelopes ahead of
        // the actual answer.
        "duplicated" => {
            let stale = error_envelope(8, "Invalid request", &params);
            format!("{stale}{stale}{}", json!({"response": "ok"}))
        }
        "unavailable" => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain")],
                "try later".to_string(),
            );
        }
        _ => error_envelope(ERROR_UNKNOWN_METHOD, "Unknown method passed", &params).to_string(),
    };
    json_body(body)
}

fn json_body(body: String) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body)
}
