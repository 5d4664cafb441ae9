//! Shared fakes and fixtures for engine integration tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use web_vision::browser::MockDriver;
use web_vision::engine::{EngineResult, RunController};
use web_vision::oracle::{ContentBlock, OracleError, OracleRequest, OracleResult, OracleTransport};
use web_vision::session::Session;
use web_vision::store::FsStore;

/// Oracle transport that replays canned responses and records every request.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Text of the last user turn of request `index`.
    pub fn user_prompt(&self, index: usize) -> String {
        let requests = self.requests.lock().unwrap();
        let request = &requests[index];
        let turn = request
            .messages
            .iter()
            .rev()
            .find(|t| t.role == "user")
            .expect("request has a user turn");
        turn.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl OracleTransport for ScriptedTransport {
    async fn invoke(&self, request: &OracleRequest) -> OracleResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OracleError::Connection("scripted transport exhausted".to_string()))
    }
}

/// A well-formed plan response for an arbitrary step.
pub fn plan_response() -> String {
    "<test_step_analysis>\n[test_step-\"scenario step\"][Single interaction needed]\n</test_step_analysis>\n\
     <visual_steps>\n[] target element visible\n</visual_steps>\n\
     <action_steps>\n[] perform the interaction\n</action_steps>\n\
     <execution_notes>\nnone\n</execution_notes>"
        .to_string()
}

/// An iterate response assembled from its optional parts.
pub fn iterate_response(action: Option<&str>, status: Option<&str>, error: Option<&str>) -> String {
    let mut response = String::from(
        "<visual_steps>\n[x] target element visible\n</visual_steps>\n\
         <action_steps>\n[x] perform the interaction\n</action_steps>\n",
    );
    response.push_str(&format!("<action>\n{}\n</action>\n", action.unwrap_or("")));
    match status {
        Some(status) => response.push_str(&format!(
            "<test_step_response>\n{{\"status\": \"{}\", \"message\": \"scenario\"}}\n</test_step_response>\n",
            status
        )),
        None => response.push_str("<test_step_response>\n</test_step_response>\n"),
    }
    response.push_str(&format!("<error>\n{}\n</error>", error.unwrap_or("")));
    response
}

/// Everything a scenario needs to assert on after a run.
pub struct Scenario {
    pub result: EngineResult<()>,
    pub store: Arc<FsStore>,
    pub transport: Arc<ScriptedTransport>,
    pub driver: Arc<MockDriver>,
    pub suite_id: String,
    pub job_name: String,
    pub pod_id: i64,
    _dir: TempDir,
}

/// Seed a suite and run record, then drive a full run with the given
/// scripted oracle responses and mock browser.
pub async fn run_scenario(steps: &[&str], responses: Vec<String>, driver: MockDriver) -> Scenario {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path().join("store")).unwrap());

    let step_list: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
    let suite = store.create_suite("scenario suite", &step_list).unwrap();
    let pod = store.create_pod("job-test", &suite.id).unwrap();

    let transport = Arc::new(ScriptedTransport::new(responses));
    let driver = Arc::new(driver);
    let session = Session::new("job-test", dir.path().join("shots")).unwrap();

    let mut controller = RunController::new(
        Arc::clone(&driver) as Arc<dyn web_vision::browser::BrowserDriver>,
        Arc::clone(&transport) as Arc<dyn OracleTransport>,
        Arc::clone(&store) as Arc<dyn web_vision::store::RunStore>,
        "job-test",
        &suite.id,
        session,
    );
    let result = controller.start().await;

    Scenario {
        result,
        store,
        transport,
        driver,
        suite_id: suite.id,
        job_name: pod.jobname,
        pod_id: pod.id,
        _dir: dir,
    }
}
