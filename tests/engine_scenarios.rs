//! End-to-end engine scenarios against scripted oracle responses, a mock
//! browser driver and a tempdir-backed store.

mod common;

use common::{iterate_response, plan_response, run_scenario};
use pretty_assertions::assert_eq;

use web_vision::browser::{DriverCall, MockDriver};
use web_vision::engine::EngineError;
use web_vision::store::{ArtifactKind, LogLevel, PodStatus, RunStatus, RunStore};

const GOTO_ACTION: &str = r#"{"task_type": "goto_page", "message": "https://example.com"}"#;
const BROKEN_BUTTON_ERROR: &str =
    r#"{"err_type": "broken_button", "description": "the submit button is dead"}"#;

/// Scenario A: one navigation step; the first iterate returns an action and
/// `partial`, the second returns `complete`. Exactly two iterate calls, one
/// executed action, run ends successfully.
#[tokio::test(start_paused = true)]
async fn navigation_step_completes_on_second_iteration() {
    let scenario = run_scenario(
        &["go to https://example.com"],
        vec![
            plan_response(),
            iterate_response(Some(GOTO_ACTION), Some("partial"), None),
            iterate_response(None, Some("complete"), None),
        ],
        MockDriver::new(),
    )
    .await;

    scenario.result.as_ref().unwrap();

    // 1 plan request + 2 iterate requests.
    assert_eq!(scenario.transport.request_count(), 3);

    // Exactly one browser action executed.
    assert_eq!(
        scenario
            .driver
            .count_calls(|c| matches!(c, DriverCall::Navigate(_))),
        1
    );

    let pod = scenario.store.pod_by_job_name(&scenario.job_name).await.unwrap();
    assert_eq!(pod.status, PodStatus::Stopped);
    assert_eq!(pod.task_status, RunStatus::Success);
    assert!(pod.error_message.is_none());
    assert!(pod.finished_at.is_some());

    // The executed action left a TASK artifact; the run left a VIDEO one.
    let artifacts = scenario.store.list_artifacts(&scenario.job_name).unwrap();
    let kinds: Vec<ArtifactKind> = artifacts.iter().map(|a| a.kind).collect();
    assert!(kinds.contains(&ArtifactKind::Task));
    assert!(kinds.contains(&ArtifactKind::Video));

    let task = artifacts.iter().find(|a| a.kind == ArtifactKind::Task).unwrap();
    assert_eq!(task.page_url, "https://example.com");
    assert_eq!(
        task.details.as_ref().unwrap()["action"]["task_type"],
        "goto_page"
    );
}

/// Scenario B: every iterate response is `partial`. After MAX_RETRIES (4)
/// iterations the run fails with a retry-exhausted error.
#[tokio::test(start_paused = true)]
async fn partial_forever_exhausts_retry_budget() {
    let partial = || iterate_response(None, Some("partial"), None);
    let scenario = run_scenario(
        &["click the flaky button"],
        vec![plan_response(), partial(), partial(), partial(), partial()],
        MockDriver::new(),
    )
    .await;

    match scenario.result {
        Err(EngineError::RetryExhausted { step_index, attempts }) => {
            assert_eq!(step_index, 0);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected RetryExhausted, got {:?}", other.map(|_| ())),
    }

    // 1 plan request, then exactly 4 iterate requests - never a 5th.
    assert_eq!(scenario.transport.request_count(), 5);

    let pod = scenario.store.pod_by_job_name(&scenario.job_name).await.unwrap();
    assert_eq!(pod.status, PodStatus::Stopped);
    assert_eq!(pod.task_status, RunStatus::Failed);
    assert!(pod
        .error_message
        .as_deref()
        .unwrap()
        .contains("failed after 4 attempts"));

    // Each consumed retry logged a warning.
    let retries = scenario
        .store
        .read_logs(scenario.pod_id)
        .unwrap()
        .into_iter()
        .filter(|r| r.message == "retry_task" && r.level == LogLevel::Warn)
        .count();
    assert_eq!(retries, 4);
}

/// Scenario C: an oracle fault report aborts the step and the whole run
/// immediately; a queued second step is never started.
#[tokio::test(start_paused = true)]
async fn oracle_fault_fails_the_run_immediately() {
    let scenario = run_scenario(
        &["submit the form", "verify the confirmation"],
        vec![
            plan_response(),
            iterate_response(None, Some("partial"), Some(BROKEN_BUTTON_ERROR)),
        ],
        MockDriver::new(),
    )
    .await;

    match scenario.result {
        Err(EngineError::Protocol { err_type, .. }) => assert_eq!(err_type, "broken_button"),
        other => panic!("expected Protocol error, got {:?}", other.map(|_| ())),
    }

    // Plan + single iterate; the second step never produced a request.
    assert_eq!(scenario.transport.request_count(), 2);

    let pod = scenario.store.pod_by_job_name(&scenario.job_name).await.unwrap();
    assert_eq!(pod.task_status, RunStatus::Failed);
    assert!(pod.error_message.as_deref().unwrap().contains("broken_button"));
}

/// Scenario D: a response with no recognizable tags at all is absorbed as
/// one retry unit, not a crash.
#[tokio::test(start_paused = true)]
async fn tagless_response_consumes_one_retry() {
    let scenario = run_scenario(
        &["open the settings page"],
        vec![
            plan_response(),
            "I'm sorry, I can't see any tags to emit here.".to_string(),
            iterate_response(None, Some("complete"), None),
        ],
        MockDriver::new(),
    )
    .await;

    scenario.result.as_ref().unwrap();
    assert_eq!(scenario.transport.request_count(), 3);
    // The garbage response must not have triggered any browser action.
    assert_eq!(
        scenario
            .driver
            .count_calls(|c| !matches!(c, DriverCall::Screenshot | DriverCall::InjectCss)),
        0
    );
}

/// Protocol status precedence: a populated error outranks a `complete`
/// verdict in the same response.
#[tokio::test(start_paused = true)]
async fn fault_report_outranks_complete_verdict() {
    let scenario = run_scenario(
        &["submit the form"],
        vec![
            plan_response(),
            iterate_response(None, Some("complete"), Some(BROKEN_BUTTON_ERROR)),
        ],
        MockDriver::new(),
    )
    .await;

    assert!(matches!(
        scenario.result,
        Err(EngineError::Protocol { .. })
    ));
    let pod = scenario.store.pod_by_job_name(&scenario.job_name).await.unwrap();
    assert_eq!(pod.task_status, RunStatus::Failed);
}

/// A `failed` verdict carries the oracle's message into the run record.
#[tokio::test(start_paused = true)]
async fn failed_verdict_is_fatal_with_message() {
    let scenario = run_scenario(
        &["log in as admin"],
        vec![plan_response(), iterate_response(None, Some("failed"), None)],
        MockDriver::new(),
    )
    .await;

    match scenario.result {
        Err(EngineError::StepFailed { step_index, message }) => {
            assert_eq!(step_index, 0);
            assert_eq!(message, "scenario");
        }
        other => panic!("expected StepFailed, got {:?}", other.map(|_| ())),
    }
}

/// Monotonic progression: step N+1's requests only start after step N
/// completed, and lookahead context flows into iterate requests.
#[tokio::test(start_paused = true)]
async fn steps_execute_strictly_in_order() {
    let scenario = run_scenario(
        &["go to https://example.com", "click the login button"],
        vec![
            plan_response(),
            iterate_response(None, Some("complete"), None),
            plan_response(),
            iterate_response(None, Some("complete"), None),
        ],
        MockDriver::new(),
    )
    .await;

    scenario.result.as_ref().unwrap();
    assert_eq!(scenario.transport.request_count(), 4);

    // Request order: plan(step 0), iterate(step 0), plan(step 1), iterate(step 1).
    assert!(scenario.transport.user_prompt(0).contains("go to https://example.com"));
    assert!(scenario
        .transport
        .user_prompt(1)
        .contains("<next_test_step>click the login button</next_test_step>"));
    assert!(scenario.transport.user_prompt(2).contains("click the login button"));
    // The last step has nothing to look ahead to.
    assert!(!scenario.transport.user_prompt(3).contains("<next_test_step>"));
}

/// A `complete` verdict suppresses any action carried in the same
/// response - there is nothing left to execute.
#[tokio::test(start_paused = true)]
async fn complete_verdict_suppresses_action_execution() {
    let scenario = run_scenario(
        &["go to https://example.com"],
        vec![
            plan_response(),
            iterate_response(Some(GOTO_ACTION), Some("complete"), None),
        ],
        MockDriver::new(),
    )
    .await;

    scenario.result.as_ref().unwrap();
    assert_eq!(
        scenario
            .driver
            .count_calls(|c| matches!(c, DriverCall::Navigate(_))),
        0
    );
}

/// A browser failure while executing an action is fatal to the run and
/// recorded on the run record.
#[tokio::test(start_paused = true)]
async fn browser_failure_fails_the_run() {
    let scenario = run_scenario(
        &["go to https://example.com"],
        vec![
            plan_response(),
            iterate_response(Some(GOTO_ACTION), Some("partial"), None),
        ],
        MockDriver::failing_navigation("net::ERR_NAME_NOT_RESOLVED"),
    )
    .await;

    assert!(matches!(scenario.result, Err(EngineError::Browser(_))));

    let pod = scenario.store.pod_by_job_name(&scenario.job_name).await.unwrap();
    assert_eq!(pod.task_status, RunStatus::Failed);
    assert!(pod
        .error_message
        .as_deref()
        .unwrap()
        .contains("ERR_NAME_NOT_RESOLVED"));

    // The video is persisted even for a failed run.
    let artifacts = scenario.store.list_artifacts(&scenario.job_name).unwrap();
    assert!(artifacts.iter().any(|a| a.kind == ArtifactKind::Video));
}

/// An oracle transport failure is fatal: there is no retry-with-backoff at
/// the engine level.
#[tokio::test(start_paused = true)]
async fn oracle_transport_failure_is_fatal() {
    // Only the plan response is scripted; the first iterate call hits an
    // exhausted transport, standing in for a transport outage.
    let scenario = run_scenario(
        &["go to https://example.com"],
        vec![plan_response()],
        MockDriver::new(),
    )
    .await;

    assert!(matches!(scenario.result, Err(EngineError::Oracle(_))));
    let pod = scenario.store.pod_by_job_name(&scenario.job_name).await.unwrap();
    assert_eq!(pod.task_status, RunStatus::Failed);
}

/// The per-step log trail lands in the store: a plan event, an eval event
/// per iteration, and the previous action carried into the next iterate
/// request.
#[tokio::test(start_paused = true)]
async fn run_logs_and_context_accumulate() {
    let scenario = run_scenario(
        &["go to https://example.com"],
        vec![
            plan_response(),
            iterate_response(Some(GOTO_ACTION), Some("partial"), None),
            iterate_response(None, Some("complete"), None),
        ],
        MockDriver::new(),
    )
    .await;

    scenario.result.as_ref().unwrap();

    let logs = scenario.store.read_logs(scenario.pod_id).unwrap();
    let messages: Vec<&str> = logs.iter().map(|r| r.message.as_str()).collect();
    assert!(messages.contains(&"test_step_flow"));
    assert!(messages.contains(&"test_step_flow_eval"));
    assert!(messages.contains(&"retry_task"));

    // The executed action is injected into the following iterate request.
    assert!(scenario
        .transport
        .user_prompt(2)
        .contains("<previous_action>"));
    assert!(scenario.transport.user_prompt(2).contains("goto_page"));
}
