//! Launching the process and serving its service task end to end.

mod common;

use std::time::Duration;

use common::{MockEngine, PROCESS_INSTANCE_KEY, activated_job, variable};
use critter_camunda::worker::{JobHandler, JobOutcome, PollReport, WorkerConfig};
use critter_camunda::{
    ActivatedJob, Animal, Error, ErrorKind, JobWorker, MemoryTokenStore, ProcessInstanceKey,
    ProcessLauncher, Result, StaticVariablesHandler, TokenSession, TokenStatus, Variables,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn assets() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("animal-image-retrieval.bpmn"), "<definitions/>").unwrap();
    std::fs::write(dir.path().join("animal-selection.form"), "{}").unwrap();
    dir
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        worker_name: "test-worker".to_owned(),
        poll_interval: Duration::from_millis(20),
        ..WorkerConfig::default()
    }
}

#[tokio::test]
async fn launch_deploys_and_starts_instance() {
    let engine = MockEngine::start().await;
    let dir = assets();
    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());
    let launcher = ProcessLauncher::new(session, dir.path());

    let launch = launcher.launch(Animal::Duck).await.unwrap();
    assert_eq!(launch.token, TokenStatus::Refreshed);
    assert_eq!(launch.deployment.deployments.len(), 2);
    assert_eq!(
        launch.process_instance.process_instance_key.as_str(),
        PROCESS_INSTANCE_KEY
    );

    let body = engine.with_state(|state| state.created_instances[0].clone());
    assert_eq!(body["processDefinitionId"], json!("Process_AnimalImageRetrieval"));
    assert_eq!(body["variables"], json!({ "animal": "duck" }));

    let second = launcher.launch(Animal::Dog).await.unwrap();
    assert_eq!(second.token, TokenStatus::Cached);
}

#[tokio::test]
async fn failed_deployment_aborts_launch() {
    let engine = MockEngine::start().await;
    engine.with_state(|state| {
        state.reject_deployments = Some(axum::http::StatusCode::BAD_REQUEST);
    });
    let dir = assets();
    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());

    let error = ProcessLauncher::new(session, dir.path())
        .launch(Animal::Fox)
        .await
        .unwrap_err();
    assert_eq!(error.message.as_deref(), Some("Failed to deploy resources"));
    assert!(engine.with_state(|state| state.created_instances.is_empty()));
}

#[tokio::test]
async fn unreadable_assets_abort_launch_before_deploying() {
    let engine = MockEngine::start().await;
    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());

    let empty = tempfile::tempdir().unwrap();
    let error = ProcessLauncher::new(session.clone(), empty.path())
        .launch(Animal::Fox)
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(error.message.as_deref(), Some("Failed to deploy resources"));
    assert!(error.source.is_some());

    let error = ProcessLauncher::new(session, empty.path().join("missing"))
        .launch(Animal::Fox)
        .await
        .unwrap_err();
    assert_eq!(error.message.as_deref(), Some("Failed to deploy resources"));

    engine.with_state(|state| {
        assert!(state.deployed_files.is_empty());
        assert!(state.created_instances.is_empty());
    });
}

#[tokio::test]
async fn wait_for_variable_polls_until_set() {
    let engine = MockEngine::start().await;
    engine.with_state(|state| {
        state.variables_hidden_for = 2;
        state
            .variables
            .push(variable("animal_url", json!("https://random.dog/b.jpg")));
    });
    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());
    session.ensure_token().await.unwrap();
    let launcher = ProcessLauncher::new(session, "unused");

    let key = ProcessInstanceKey::new(PROCESS_INSTANCE_KEY);
    let value = launcher
        .wait_for_variable(&key, "animal_url", Duration::from_millis(10), 5)
        .await
        .unwrap();
    assert_eq!(value, json!("https://random.dog/b.jpg"));
    assert_eq!(engine.with_state(|state| state.variable_searches), 3);

    let error = launcher
        .wait_for_variable(&key, "missing", Duration::from_millis(10), 2)
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn wait_for_variable_polls_once_for_zero_attempts() {
    let engine = MockEngine::start().await;
    engine.with_state(|state| {
        state
            .variables
            .push(variable("animal_url", json!("https://randomfox.ca/images/1.jpg")));
    });
    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());
    session.ensure_token().await.unwrap();
    let launcher = ProcessLauncher::new(session, "unused");

    let key = ProcessInstanceKey::new(PROCESS_INSTANCE_KEY);
    let value = launcher
        .wait_for_variable(&key, "animal_url", Duration::ZERO, 0)
        .await
        .unwrap();
    assert_eq!(value, json!("https://randomfox.ca/images/1.jpg"));
    assert_eq!(engine.with_state(|state| state.variable_searches), 1);

    let error = launcher
        .wait_for_variable(&key, "missing", Duration::ZERO, 0)
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert_eq!(engine.with_state(|state| state.variable_searches), 2);
}

#[tokio::test]
async fn poll_once_completes_activated_jobs() {
    let engine = MockEngine::start().await;
    engine.with_state(|state| {
        state.pending_jobs.push(activated_job("5001", "fox", 3));
        state.pending_jobs.push(activated_job("5002", "dog", 3));
    });

    let mut variables = Variables::new();
    variables.insert("animal_url".to_owned(), json!("https://randomfox.ca/images/1.jpg"));
    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());
    let worker = JobWorker::new(session, StaticVariablesHandler::new(variables), worker_config());

    let report = worker.poll_once().await.unwrap();
    assert_eq!(
        report,
        PollReport {
            activated: 2,
            completed: 2,
            failed: 0,
            errors: 0,
        }
    );

    let (activation, completions) =
        engine.with_state(|state| (state.activations[0].clone(), state.completions.clone()));
    assert_eq!(activation["type"], json!("retrieve-animal-image"));
    assert_eq!(activation["timeout"], json!(60000));
    assert_eq!(activation["maxJobsToActivate"], json!(5));
    assert_eq!(activation["worker"], json!("test-worker"));
    assert_eq!(completions.len(), 2);
    assert_eq!(
        completions[1].1,
        json!({ "variables": { "animal_url": "https://randomfox.ca/images/1.jpg" } })
    );
}

struct FoxOnly;

#[async_trait::async_trait]
impl JobHandler for FoxOnly {
    async fn handle(&self, job: &ActivatedJob) -> Result<JobOutcome> {
        match job.variable_str("animal") {
            Some("fox") => Ok(JobOutcome::Complete(Variables::new())),
            Some("duck") => Ok(JobOutcome::Fail {
                message: "ducks are out".to_owned(),
                retries: Some(0),
            }),
            _ => Err(Error::invalid_input().with_message("unsupported animal")),
        }
    }
}

#[tokio::test]
async fn poll_once_reports_failures() {
    let engine = MockEngine::start().await;
    engine.with_state(|state| {
        state.pending_jobs.push(activated_job("6001", "fox", 3));
        state.pending_jobs.push(activated_job("6002", "duck", 3));
        state.pending_jobs.push(activated_job("6003", "cat", 3));
    });

    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());
    let worker = JobWorker::new(session, FoxOnly, worker_config());

    let report = worker.poll_once().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 2);

    let failures = engine.with_state(|state| state.failures.clone());
    assert_eq!(failures[0].0, "6002");
    assert_eq!(failures[0].1["retries"], json!(0));
    assert_eq!(failures[0].1["errorMessage"], json!("ducks are out"));
    assert_eq!(failures[1].0, "6003");
    assert_eq!(failures[1].1["retries"], json!(2));
    assert!(
        failures[1].1["errorMessage"]
            .as_str()
            .unwrap()
            .contains("unsupported animal")
    );
}

#[tokio::test]
async fn run_stops_on_cancellation() {
    let engine = MockEngine::start().await;
    engine.with_state(|state| state.pending_jobs.push(activated_job("7001", "dog", 3)));

    let session = TokenSession::new(engine.client(), MemoryTokenStore::new());
    let worker = JobWorker::new(session, StaticVariablesHandler::default(), worker_config());

    let cancel = CancellationToken::new();
    let handle = worker.spawn(cancel.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    let (polls, completions) =
        engine.with_state(|state| (state.activations.len(), state.completions.len()));
    assert!(polls >= 2);
    assert_eq!(completions, 1);
}
