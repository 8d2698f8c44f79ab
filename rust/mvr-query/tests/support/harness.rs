use axum::{
    body::{self, Body},
    http::{self, Request, StatusCode},
    Router,
};
use mvr_query::{config::AppConfig, server::Server};
use serde_json::Value;
use std::sync::Once;
use tower::ServiceExt;

pub const API_KEY: &str = "test-api-key";
pub const TABLE: &str = "mvr";
pub const COLUMNS: [&str; 8] = [
    "MAKE",
    "MODEL",
    "VEHICLE_YEAR",
    "MOTIVE_POWER",
    "VEHICLE_TYPE",
    "BODY_TYPE",
    "TLA",
    "GROSS_VEHICLE_MASS",
];

static TRACING_INIT: Once = Once::new();

/// In-process router over an embedded configuration; no listener is bound.
#[derive(Clone)]
pub struct MvrTestHarness {
    router: Router,
}

impl MvrTestHarness {
    pub fn new() -> Self {
        TRACING_INIT.call_once(|| {
            let _ = tracing_subscriber::fmt::try_init();
        });

        let mut config = AppConfig::embedded(TABLE, COLUMNS);
        config.api_key = Some(API_KEY.to_string());
        Self {
            router: Server::new(config).router(),
        }
    }

    pub async fn translate(&self, payload: Value) -> http::Response<Body> {
        self.send(post("/translate", &payload, true)).await
    }

    pub async fn translate_without_api_key(&self, payload: Value) -> http::Response<Body> {
        self.send(post("/translate", &payload, false)).await
    }

    pub async fn get(&self, path: &str) -> http::Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .expect("failed to build harness request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> http::Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should handle harness request")
    }
}

fn post(path: &str, payload: &Value, include_api_key: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(http::header::CONTENT_TYPE, "application/json");

    if include_api_key {
        builder = builder.header("x-api-key", API_KEY);
    }

    let body = serde_json::to_vec(payload).expect("request payload should serialize");
    builder
        .body(Body::from(body))
        .expect("failed to build harness request")
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should deserialize");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}
