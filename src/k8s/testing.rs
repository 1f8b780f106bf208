//! In-process mock API server for unit tests
//!
//! Every request is recorded and answered by a caller-supplied responder,
//! so tests can script the cluster state they need.

use http::{Method, Request, Response, StatusCode};
use kube::Client;
use kube::client::Body;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower_test::mock;

/// A request as seen by the mock API server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: Value,
}

impl Recorded {
    /// Query string with `%3D`/`%2C` decoded, handy for selector assertions
    pub fn decoded_query(&self) -> String {
        self.query
            .replace("%3D", "=")
            .replace("%2C", ",")
            .replace("%2F", "/")
    }
}

pub type RequestLog = Arc<Mutex<Vec<Recorded>>>;

/// Start a mock API server. The responder maps each request to a status and JSON body.
pub fn mock_client<F>(responder: F) -> (Client, RequestLog)
where
    F: Fn(&Recorded) -> (StatusCode, Value) + Send + 'static,
{
    let (service, mut handle) = mock::pair::<Request<Body>, Response<Body>>();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let recorded_log = log.clone();

    tokio::spawn(async move {
        while let Some((request, send)) = handle.next_request().await {
            let (parts, body) = request.into_parts();
            let bytes = body.collect_bytes().await.unwrap_or_default();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            let recorded = Recorded {
                method: parts.method,
                path: parts.uri.path().to_string(),
                query: parts.uri.query().unwrap_or_default().to_string(),
                body,
            };

            let (status, value) = responder(&recorded);
            recorded_log.lock().unwrap().push(recorded);

            let response = Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&value).unwrap()))
                .unwrap();
            send.send_response(response);
        }
    });

    (Client::new(service, "default"), log)
}

pub fn ok(value: Value) -> (StatusCode, Value) {
    (StatusCode::OK, value)
}

pub fn not_found() -> (StatusCode, Value) {
    status(StatusCode::NOT_FOUND, "NotFound")
}

pub fn status(code: StatusCode, reason: &str) -> (StatusCode, Value) {
    (
        code,
        json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": format!("{} ({})", reason, code.as_u16()),
            "reason": reason,
            "code": code.as_u16(),
        }),
    )
}

pub fn list(kind: &str, api_version: &str, items: Vec<Value>) -> Value {
    json!({
        "kind": kind,
        "apiVersion": api_version,
        "metadata": { "resourceVersion": "1" },
        "items": items,
    })
}

pub fn namespace(name: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name },
    })
}

pub fn named(kind: &str, api_version: &str, namespace: Option<&str>, name: &str) -> Value {
    let mut metadata = json!({ "name": name });
    if let Some(ns) = namespace {
        metadata["namespace"] = json!(ns);
    }
    json!({ "apiVersion": api_version, "kind": kind, "metadata": metadata })
}

/// A deployment selecting `app=<name>` with the given `(container, image)` pairs
pub fn deployment(namespace: &str, name: &str, containers: &[(&str, &str)]) -> Value {
    let containers: Vec<Value> = containers
        .iter()
        .map(|(container, image)| {
            json!({
                "name": container,
                "image": image,
                "env": [{ "name": "KEEP_ME", "value": "1" }],
            })
        })
        .collect();
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": "7",
            "labels": { "app": name },
        },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": {
                "metadata": { "labels": { "app": name } },
                "spec": { "containers": containers },
            },
        },
    })
}

/// A pod in the given phase, optionally with a waiting container message
pub fn pod(namespace: &str, name: &str, phase: &str, waiting: Option<&str>) -> Value {
    let statuses = match waiting {
        Some(message) => json!([{
            "name": "main",
            "image": "busybox",
            "imageID": "",
            "ready": false,
            "restartCount": 0,
            "state": { "waiting": { "reason": "ImagePullBackOff", "message": message } },
        }]),
        None => json!([]),
    };
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": name, "namespace": namespace },
        "status": { "phase": phase, "containerStatuses": statuses },
    })
}
