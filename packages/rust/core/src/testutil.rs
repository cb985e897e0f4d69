//! Scripted completion client for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ethicsgen_shared::{EthicsGenError, Result};

use crate::llm::{CompletionClient, CompletionRequest};
use crate::reasoning::{BEGIN_SOLUTION, BEGIN_THOUGHT, END_SOLUTION, END_THOUGHT};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Answers every request through a closure and records what it was asked.
pub(crate) struct StubClient {
    respond: Responder,
    delay: Option<Box<dyn Fn(&CompletionRequest) -> Duration + Send + Sync>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<CompletionRequest>>,
}

impl StubClient {
    pub(crate) fn new(
        respond: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with well-formed reasoning.
    pub(crate) fn well_formed() -> Self {
        Self::new(|_| Ok(tagged("The passage raises a concern.", "Ask for consent first.")))
    }

    /// Always answers with the given text.
    pub(crate) fn fixed(text: &'static str) -> Self {
        Self::new(move |_| Ok(text.to_string()))
    }

    /// Always fails as if the endpoint were down.
    pub(crate) fn unreachable() -> Self {
        Self::new(|_| Err(EthicsGenError::Network("connection refused".into())))
    }

    pub(crate) fn with_delay(
        mut self,
        delay: impl Fn(&CompletionRequest) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<CompletionRequest> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionClient for StubClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.clone());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(request)).await;
        }
        (self.respond)(request)
    }
}

pub(crate) fn tagged(thought: &str, solution: &str) -> String {
    format!("{BEGIN_THOUGHT}\n{thought}\n{END_THOUGHT}\n\n{BEGIN_SOLUTION}\n{solution}\n{END_SOLUTION}")
}
