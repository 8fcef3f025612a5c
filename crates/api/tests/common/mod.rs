#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use microsim_api::config::ServerConfig;
use microsim_api::router::build_app_router;
use microsim_api::state::AppState;
use microsim_compute::{ComputeBackend, ComputeError, ComputeRequest};
use microsim_core::job::TaxBenefitModel;
use microsim_db::memory::MemoryJobStore;
use microsim_events::EventBus;
use microsim_pipeline::service::{JobService, ServiceSettings};
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

pub const CALLBACK_TOKEN: &str = "test-callback-token";
pub const UK_MODEL_VERSION: Uuid = Uuid::from_u128(0x0a);

/// Compute backend that records spawns and never calls back on its own.
#[derive(Default)]
pub struct RecordingBackend {
    spawned: Mutex<Vec<ComputeRequest>>,
}

impl RecordingBackend {
    pub async fn functions(&self) -> Vec<String> {
        self.spawned
            .lock()
            .await
            .iter()
            .map(|r| r.function.clone())
            .collect()
    }
}

#[async_trait]
impl ComputeBackend for RecordingBackend {
    async fn spawn(&self, request: &ComputeRequest) -> Result<(), ComputeError> {
        self.spawned.lock().await.push(request.clone());
        Ok(())
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![HeaderValue::from_static("http://localhost:3000")],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: None,
        compute_url: "http://localhost:8001".to_string(),
        compute_app: "policyengine".to_string(),
        compute_timeout_secs: 5,
        callback_token: Some(CALLBACK_TOKEN.to_string()),
        sequencer_sweep_secs: 1,
        model_versions: HashMap::from([(TaxBenefitModel::PolicyEngineUk, UK_MODEL_VERSION)]),
    }
}

pub struct TestApp {
    pub router: Router,
    pub service: Arc<JobService>,
    pub backend: Arc<RecordingBackend>,
}

/// Build the full application router over an in-memory store, with the same
/// middleware stack production uses.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let backend = Arc::new(RecordingBackend::default());
    let service = Arc::new(JobService::new(
        Arc::new(MemoryJobStore::new()),
        Arc::new(EventBus::default()),
        backend.clone(),
        ServiceSettings {
            model_versions: config.model_versions.clone(),
            sweep_interval: config.sequencer_sweep_interval(),
        },
    ));

    let state = AppState {
        service: Arc::clone(&service),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        service,
        backend,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Method::GET, uri, None, &[]).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(Method::POST, uri, Some(body), &[]).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
