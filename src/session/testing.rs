use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::session::transport::{ApiRequest, ApiResponse, Transport};

/// Replays queued responses in order and records every request it sees. An
/// empty queue answers 404.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<ApiResponse>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: u16, body: Value) {
        self.push_response(ApiResponse { status, body });
    }

    pub fn push_response(&self, response: ApiResponse) {
        self.responses.lock().expect("responses lock").push_back(response);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &ApiRequest) -> ApiResponse {
        self.requests.lock().expect("requests lock").push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or(ApiResponse {
                status: 404,
                body: Value::Null,
            })
    }
}
