use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::scenario::BuiltinScenario;
use crate::transport::{BackendTransport, CopilotApi, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RecordedCall>,
    responses: HashMap<String, Result<Value, TransportError>>,
}

/// Scripted backend that records every call it receives.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn api(&self) -> CopilotApi {
        CopilotApi::new(Arc::new(self.clone()))
    }

    pub fn respond(&self, path: &str, value: Value) {
        self.lock().responses.insert(path.to_string(), Ok(value));
    }

    pub fn respond_prompt(&self, scenario: BuiltinScenario, prompt: &str) {
        self.respond(
            CopilotApi::prompt_path(scenario).as_str(),
            json!({ "prompt": prompt, "type": scenario.as_str() }),
        );
    }

    pub fn fail(&self, path: &str, error: TransportError) {
        self.lock().responses.insert(path.to_string(), Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| format!("{} {}", call.method, call.path))
            .collect()
    }

    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.calls()
            .into_iter()
            .rev()
            .find(|call| call.path == path)
            .and_then(|call| call.body)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake backend lock")
    }

    fn answer(
        &self,
        method: &'static str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });
        state.responses.get(path).cloned().unwrap_or_else(|| {
            Err(TransportError::Http {
                status: 404,
                detail: Some("Not Found".to_string()),
                body: r#"{"detail":"Not Found"}"#.to_string(),
            })
        })
    }
}

#[async_trait]
impl BackendTransport for FakeBackend {
    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        self.answer("GET", path, None)
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.answer("POST", path, Some(body))
    }
}
