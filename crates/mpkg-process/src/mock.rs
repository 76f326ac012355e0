//! Scripted [`ToolRunner`] for tests
//!
//! Responses are keyed by program name, optionally followed by the first
//! argument (`"xcrun notarytool"` vs `"xcrun stapler"`). The more specific key
//! wins. Each key holds a queue; the last queued response is reused once the
//! others are consumed. Unscripted calls succeed with empty output.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use crate::invocation::Invocation;
use crate::result::ProcessResult;
use crate::runner::ToolRunner;

#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    pub result: ProcessResult,
    /// Create an empty file at the invocation's last argument
    pub touch_output: bool,
}

impl MockResponse {
    pub fn ok() -> Self {
        MockResponse::default()
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        MockResponse {
            result: ProcessResult {
                stdout: text.into(),
                ..Default::default()
            },
            touch_output: false,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        MockResponse {
            result: ProcessResult {
                exit_code,
                stderr: stderr.into(),
                ..Default::default()
            },
            touch_output: false,
        }
    }

    pub fn touching_output(mut self) -> Self {
        self.touch_output = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct MockRunner {
    responses: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner::default()
    }

    /// Queue a response for `key`
    pub fn respond(self, key: &str, response: MockResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry(key.to_string())
                .or_default()
                .push_back(response);
        }
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded calls matching `key`
    pub fn count(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|inv| keys_for(inv).iter().any(|k| k == key))
            .count()
    }

    pub fn invoked(&self, key: &str) -> bool {
        self.count(key) > 0
    }

    /// First recorded call matching `key`
    pub fn find(&self, key: &str) -> Option<Invocation> {
        self.calls()
            .into_iter()
            .find(|inv| keys_for(inv).iter().any(|k| k == key))
    }

    fn next_response(&self, invocation: &Invocation) -> MockResponse {
        let Ok(mut responses) = self.responses.lock() else {
            return MockResponse::ok();
        };
        for key in keys_for(invocation) {
            if let Some(queue) = responses.get_mut(&key) {
                let response = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                if let Some(response) = response {
                    return response;
                }
            }
        }
        MockResponse::ok()
    }
}

fn keys_for(invocation: &Invocation) -> Vec<String> {
    let program = invocation.program_name();
    match invocation.args.first() {
        Some(first) => vec![format!("{} {}", program, first), program],
        None => vec![program],
    }
}

#[async_trait]
impl ToolRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> ProcessResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        let response = self.next_response(invocation);
        if response.touch_output {
            if let Some(last) = invocation.args.last() {
                let path = Path::new(last);
                if let Some(parent) = path.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                let _ = fs::write(path, b"");
            }
        }
        response.result
    }
}
