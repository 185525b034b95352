//! In-process stand-in for a Camunda 8 cluster and its OAuth server.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Multipart, Path, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use critter_camunda::{CamundaClient, CamundaConfig};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const CLIENT_ID: &str = "critter";
pub const CLIENT_SECRET: &str = "secret";
pub const PROCESS_INSTANCE_KEY: &str = "2251799813685300";

/// Everything the mock engine has seen and will answer with.
#[derive(Debug, Default)]
pub struct EngineState {
    /// Tokens the engine currently accepts.
    pub valid_tokens: HashSet<String>,
    /// Number of tokens issued by the OAuth endpoint.
    pub issued_tokens: usize,
    /// Number of topology requests.
    pub topology_calls: usize,
    /// File names of the last deployment.
    pub deployed_files: Vec<String>,
    /// Tenant of the last deployment.
    pub deployed_tenant: Option<String>,
    /// Bodies of process instance creation requests.
    pub created_instances: Vec<Value>,
    /// Bodies of job activation requests.
    pub activations: Vec<Value>,
    /// Jobs returned by the next activation.
    pub pending_jobs: Vec<Value>,
    /// Jobs offered by job search.
    pub searchable_jobs: Vec<Value>,
    /// `(job key, body)` of job completions.
    pub completions: Vec<(String, Value)>,
    /// `(job key, body)` of job failures.
    pub failures: Vec<(String, Value)>,
    /// Variables offered by variable search.
    pub variables: Vec<Value>,
    /// Number of variable searches.
    pub variable_searches: usize,
    /// Variable searches answered with no items before `variables` is used.
    pub variables_hidden_for: usize,
    /// Deployment requests are rejected with this status when set.
    pub reject_deployments: Option<StatusCode>,
    /// Method, path and headers of every request, in arrival order.
    pub requests: Vec<RecordedRequest>,
}

/// A request as it reached the engine.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Handle to a running mock engine.
#[derive(Clone)]
pub struct MockEngine {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<EngineState>>,
}

impl MockEngine {
    /// Starts the engine on an ephemeral loopback port.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(EngineState::default()));

        let router = Router::new()
            .route("/oauth/token", post(issue_token))
            .route("/v2/topology", get(topology))
            .route("/v2/deployments", post(deploy))
            .route("/v2/process-instances", post(create_instance))
            .route("/v2/process-instances/{key}", get(get_instance))
            .route("/v2/process-definitions/search", post(search_definitions))
            .route("/v2/jobs/search", post(search_jobs))
            .route("/v2/jobs/activation", post(activate_jobs))
            .route("/v2/jobs/{key}/completion", post(complete_job))
            .route("/v2/jobs/{key}/failure", post(fail_job))
            .route("/v2/variables/search", post(search_variables))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn auth_url(&self) -> String {
        format!("http://{}/oauth/token", self.addr)
    }

    pub fn config(&self) -> CamundaConfig {
        CamundaConfig::new(self.base_url(), self.auth_url(), CLIENT_ID, CLIENT_SECRET)
    }

    pub fn client(&self) -> CamundaClient {
        CamundaClient::new(self.config()).unwrap()
    }

    /// Runs `f` with the engine state locked.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut EngineState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    /// The most recent request with the given method and raw path.
    pub fn last_request(&self, method: Method, path: &str) -> Option<RecordedRequest> {
        self.with_state(|state| {
            state
                .requests
                .iter()
                .rev()
                .find(|request| request.method == method && request.path == path)
                .cloned()
        })
    }

    /// Makes the engine reject every token issued so far.
    pub fn revoke_tokens(&self) {
        self.with_state(|state| state.valid_tokens.clear());
    }
}

type Shared = State<Arc<Mutex<EngineState>>>;

async fn record(State(state): Shared, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().clone(),
        path: request.uri().path().to_owned(),
        headers: request.headers().clone(),
    };
    state.lock().unwrap().requests.push(recorded);
    next.run(request).await
}

fn authorized(state: &Mutex<EngineState>, headers: &HeaderMap) -> bool {
    let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return false;
    };

    state.lock().unwrap().valid_tokens.contains(token)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

#[derive(Debug, Deserialize)]
struct TokenForm {
    grant_type: String,
    audience: String,
    client_id: String,
    client_secret: String,
}

async fn issue_token(State(state): Shared, Form(form): Form<TokenForm>) -> Response {
    if form.grant_type != "client_credentials"
        || form.audience.is_empty()
        || form.client_id != CLIENT_ID
        || form.client_secret != CLIENT_SECRET
    {
        return (StatusCode::UNAUTHORIZED, r#"{"error":"access_denied"}"#).into_response();
    }

    let mut state = state.lock().unwrap();
    state.issued_tokens += 1;
    let token = format!("token-{}", state.issued_tokens);
    state.valid_tokens.insert(token.clone());

    Json(json!({
        "access_token": token,
        "expires_in": 300,
        "token_type": "Bearer",
        "scope": ""
    }))
    .into_response()
}

async fn topology(State(state): Shared, headers: HeaderMap) -> Response {
    state.lock().unwrap().topology_calls += 1;
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    Json(json!({
        "brokers": [{
            "nodeId": 0,
            "host": "zeebe",
            "port": 26501,
            "partitions": [{ "partitionId": 1, "role": "leader", "health": "healthy" }],
            "version": "8.7.0"
        }],
        "clusterSize": 1,
        "partitionsCount": 1,
        "replicationFactor": 1,
        "gatewayVersion": "8.7.0"
    }))
    .into_response()
}

async fn deploy(State(state): Shared, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let rejected = state.lock().unwrap().reject_deployments;
    if let Some(status) = rejected {
        return (status, "rejected").into_response();
    }

    let mut files = Vec::new();
    let mut tenant = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("resources") => files.push(field.file_name().unwrap_or_default().to_owned()),
            Some("tenantId") => tenant = Some(field.text().await.unwrap()),
            _ => {}
        }
    }

    let deployments: Vec<Value> = files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            if file.ends_with(".bpmn") {
                json!({ "processDefinition": {
                    "processDefinitionId": "Process_AnimalImageRetrieval",
                    "processDefinitionVersion": 1,
                    "processDefinitionKey": format!("22517998136852{index:02}"),
                    "resourceName": file,
                    "tenantId": "<default>"
                }})
            } else {
                json!({ "form": {
                    "formId": "animal-selection",
                    "version": 1,
                    "formKey": format!("22517998136852{index:02}"),
                    "resourceName": file,
                    "tenantId": "<default>"
                }})
            }
        })
        .collect();

    let mut state = state.lock().unwrap();
    state.deployed_files = files;
    state.deployed_tenant = tenant;

    Json(json!({
        "deploymentKey": "2251799813685249",
        "tenantId": "<default>",
        "deployments": deployments
    }))
    .into_response()
}

async fn create_instance(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let definition_id = body["processDefinitionId"].clone();
    let variables = body["variables"].clone();
    state.lock().unwrap().created_instances.push(body);

    Json(json!({
        "processDefinitionKey": "2251799813685250",
        "processDefinitionId": definition_id,
        "processDefinitionVersion": 1,
        "tenantId": "<default>",
        "variables": variables,
        // Older gateways return keys as integers.
        "processInstanceKey": 2251799813685300u64
    }))
    .into_response()
}

async fn get_instance(State(state): Shared, headers: HeaderMap, Path(key): Path<String>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    if key != PROCESS_INSTANCE_KEY {
        return (StatusCode::NOT_FOUND, r#"{"title":"NOT_FOUND"}"#).into_response();
    }

    Json(json!({
        "processInstanceKey": key,
        "processDefinitionId": "Process_AnimalImageRetrieval",
        "processDefinitionName": "Animal Image Retrieval",
        "processDefinitionVersion": 1,
        "processDefinitionKey": "2251799813685250",
        "state": "ACTIVE",
        "startDate": "2026-10-18T09:00:00.000Z",
        "hasIncident": false,
        "tenantId": "<default>"
    }))
    .into_response()
}

async fn search_definitions(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let mut items = vec![json!({
        "processDefinitionKey": "2251799813685250",
        "processDefinitionId": "Process_AnimalImageRetrieval",
        "name": "Animal Image Retrieval",
        "resourceName": "animal-image-retrieval.bpmn",
        "version": 1,
        "tenantId": "<default>"
    })];

    if let Some(id) = body["filter"]["processDefinitionId"].as_str()
        && id != "Process_AnimalImageRetrieval"
    {
        items.clear();
    }

    Json(json!({ "items": items, "page": { "totalItems": items.len() } })).into_response()
}

async fn search_jobs(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let items: Vec<Value> = state
        .lock()
        .unwrap()
        .searchable_jobs
        .iter()
        .filter(|job| {
            job["processInstanceKey"] == body["filter"]["processInstanceKey"]
                && job["type"] == body["filter"]["type"]
        })
        .cloned()
        .collect();

    Json(json!({ "items": items, "page": { "totalItems": items.len() } })).into_response()
}

async fn activate_jobs(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let mut state = state.lock().unwrap();
    let max = body["maxJobsToActivate"].as_u64().unwrap_or(0) as usize;
    let take = max.min(state.pending_jobs.len());
    let jobs: Vec<Value> = state.pending_jobs.drain(..take).collect();
    state.activations.push(body);

    Json(json!({ "jobs": jobs })).into_response()
}

async fn complete_job(
    State(state): Shared,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    if key == "missing" {
        return (StatusCode::NOT_FOUND, r#"{"title":"NOT_FOUND"}"#).into_response();
    }

    state.lock().unwrap().completions.push((key, body));
    StatusCode::NO_CONTENT.into_response()
}

async fn fail_job(
    State(state): Shared,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    state.lock().unwrap().failures.push((key, body));
    StatusCode::NO_CONTENT.into_response()
}

async fn search_variables(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let mut state = state.lock().unwrap();
    state.variable_searches += 1;
    if state.variable_searches <= state.variables_hidden_for {
        return Json(json!({ "items": [], "page": { "totalItems": 0 } })).into_response();
    }

    let items: Vec<Value> = state
        .variables
        .iter()
        .filter(|variable| variable["processInstanceKey"] == body["filter"]["processInstanceKey"])
        .cloned()
        .collect();

    Json(json!({ "items": items, "page": { "totalItems": items.len() } })).into_response()
}

/// Builds a variable search item with a JSON-encoded value.
pub fn variable(name: &str, value: Value) -> Value {
    json!({
        "variableKey": format!("{name}-key"),
        "name": name,
        "value": value.to_string(),
        "processInstanceKey": PROCESS_INSTANCE_KEY,
        "scopeKey": PROCESS_INSTANCE_KEY,
        "isTruncated": false,
        "tenantId": "<default>"
    })
}

/// Builds an activated job for the image retrieval task.
pub fn activated_job(key: &str, animal: &str, retries: i32) -> Value {
    json!({
        "jobKey": key,
        "type": "retrieve-animal-image",
        "processInstanceKey": PROCESS_INSTANCE_KEY,
        "processDefinitionKey": "2251799813685250",
        "processDefinitionId": "Process_AnimalImageRetrieval",
        "elementId": "Task_RetrieveAnimalImage",
        "retries": retries,
        "customHeaders": {},
        "variables": { "animal": animal }
    })
}
