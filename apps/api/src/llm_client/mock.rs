//! Queue-backed `ModelInvoker` for stage and sequencer tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{LlmError, ModelInvoker};

/// One recorded `invoke` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
    pub timeout: Duration,
}

pub struct MockInvoker {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses(responses: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        let mock = Self::new();
        mock.responses.lock().unwrap().extend(responses);
        mock
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelInvoker for MockInvoker {
    async fn invoke(
        &self,
        system: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            timeout,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("mock queue exhausted".to_string())))
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_in_order_and_records() {
        let mock = MockInvoker::new();
        mock.push_text("one");
        mock.push_error(LlmError::EmptyResponse);

        let first = mock.invoke("sys", "p1", Duration::from_secs(1)).await;
        let second = mock.invoke("sys", "p2", Duration::from_secs(1)).await;
        let third = mock.invoke("sys", "p3", Duration::from_secs(1)).await;

        assert_eq!(first.unwrap(), "one");
        assert!(matches!(second, Err(LlmError::EmptyResponse)));
        assert!(matches!(third, Err(LlmError::Unavailable(_))));
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls()[1].prompt, "p2");
        assert_eq!(mock.remaining(), 0);
    }
}
