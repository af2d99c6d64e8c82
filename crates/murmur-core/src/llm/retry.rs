use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use super::provider::ModelProvider;
use super::types::{GenerateConfig, Message, ModelResponse, ToolSchema};

/// Fixed-count, fixed-delay retry for the whole-turn model call.
/// Non-transient errors fail immediately; exhausting the budget re-raises
/// the underlying error.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

pub async fn complete_with_retry(
    provider: &dyn ModelProvider,
    messages: &[Message],
    tools: &[ToolSchema],
    config: &GenerateConfig,
    policy: &RetryPolicy,
) -> Result<ModelResponse> {
    let mut last_error = None;

    for attempt in 0..policy.max_attempts.max(1) {
        if attempt > 0 {
            warn!(
                model = provider.model_name(),
                attempt,
                delay_ms = policy.delay.as_millis() as u64,
                "Retrying model call"
            );
            tokio::time::sleep(policy.delay).await;
        }

        match provider.complete(messages, tools, config).await {
            Ok(response) => {
                if attempt > 0 {
                    info!(
                        model = provider.model_name(),
                        attempt, "Model call succeeded after retry"
                    );
                }
                return Ok(response);
            }
            Err(e) => {
                let err_str = e.to_string();
                if !is_transient(&err_str) {
                    return Err(e);
                }
                warn!(
                    model = provider.model_name(),
                    error = %err_str,
                    attempt,
                    "Transient model error"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("model call failed with no attempts")))
}

/// Check if error message indicates a retryable condition
fn is_transient(error: &str) -> bool {
    error.contains("429")
        || error.contains("500")
        || error.contains("502")
        || error.contains("503")
        || error.contains("529")
        || error.contains("rate limit")
        || error.contains("overloaded")
        || error.contains("timed out")
        || error.contains("connection")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{Content, StopReason, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with a transient error until `fail_count` calls have happened.
    struct FlakyProvider {
        fail_count: usize,
        calls: AtomicUsize,
        transient: bool,
    }

    #[async_trait]
    impl ModelProvider for FlakyProvider {
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _config: &GenerateConfig,
        ) -> Result<ModelResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_count {
                if self.transient {
                    Err(anyhow!("API error (429): rate limit exceeded"))
                } else {
                    Err(anyhow!("API error (401): unauthorized"))
                }
            } else {
                Ok(ModelResponse {
                    content: Content::Text {
                        text: "recovered".into(),
                    },
                    stop_reason: StopReason::EndTurn,
                    usage: Usage::default(),
                    model: "flaky".into(),
                })
            }
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let provider = FlakyProvider {
            fail_count: 2,
            calls: AtomicUsize::new(0),
            transient: true,
        };

        let response = complete_with_retry(
            &provider,
            &[Message::user("hi")],
            &[],
            &GenerateConfig::default(),
            &fast_policy(3),
        )
        .await
        .unwrap();

        assert_eq!(response.content.extract_text(), "recovered");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_budget_reraises_error() {
        let provider = FlakyProvider {
            fail_count: 10,
            calls: AtomicUsize::new(0),
            transient: true,
        };

        let err = complete_with_retry(
            &provider,
            &[Message::user("hi")],
            &[],
            &GenerateConfig::default(),
            &fast_policy(3),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("429"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_error_fails_immediately() {
        let provider = FlakyProvider {
            fail_count: 10,
            calls: AtomicUsize::new(0),
            transient: false,
        };

        let err = complete_with_retry(
            &provider,
            &[Message::user("hi")],
            &[],
            &GenerateConfig::default(),
            &fast_policy(3),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("401"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
