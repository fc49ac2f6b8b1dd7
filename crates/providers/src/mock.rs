//! Scripted provider — a deterministic completion backend.
//!
//! Replays a queue of responses, one per `generate()` call. Used by tests
//! across the workspace and by `--dry-run` style offline flows.

use async_trait::async_trait;
use hearth_core::context::Context;
use hearth_core::error::ProviderError;
use hearth_core::provider::Provider;
use std::sync::Mutex;

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return this text.
    Text(String),
    /// Fail with a network error carrying this message.
    Error(String),
}

/// A provider that returns a sequence of scripted responses.
///
/// Each call to `generate` returns the next response in the queue. When the
/// queue runs dry the last response is repeated, so loops that call the
/// provider an unpredictable number of times stay deterministic.
pub struct ScriptedProvider {
    responses: Mutex<Vec<ScriptedResponse>>,
    calls: Mutex<Vec<Context>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        assert!(!responses.is_empty(), "ScriptedProvider needs at least one response");
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always returns the same text.
    pub fn always(text: &str) -> Self {
        Self::new(vec![ScriptedResponse::Text(text.to_string())])
    }

    /// A provider that returns each text in order, repeating the last.
    pub fn sequence(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| ScriptedResponse::Text(t.to_string()))
                .collect(),
        )
    }

    /// A provider that always fails.
    pub fn failing(message: &str) -> Self {
        Self::new(vec![ScriptedResponse::Error(message.to_string())])
    }

    /// How many `generate` calls have been made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The contexts passed to `generate`, in call order.
    pub fn recorded_calls(&self) -> Vec<Context> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, context: &Context) -> Result<String, ProviderError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(context.clone());
            calls.len() - 1
        };

        let responses = self.responses.lock().unwrap();
        let response = responses
            .get(index)
            .unwrap_or_else(|| responses.last().expect("non-empty queue"))
            .clone();

        match response {
            ScriptedResponse::Text(text) => Ok(text),
            ScriptedResponse::Error(message) => Err(ProviderError::Network(message)),
        }
    }
}
