//! Reentrant sub-queries from inside running script code.
//!
//! Script execution happens on a blocking worker thread while the tokio
//! runtime stays free; `llm_query` submits a chat future to the runtime and
//! blocks the worker until it resolves or the per-call timeout fires. Budget
//! and timeout failures surface into the script as runtime errors, which the
//! executor formats into stderr so the model can recover next iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::future::join_all;

use wyrm_llm::{ChatMessage, LlmClient};

use crate::events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};

/// Maximum prompts accepted by one batched call.
pub const MAX_BATCH: usize = 5;

/// Default per-iteration sub-query budget.
pub const DEFAULT_BUDGET: u32 = 5;

/// Default per-call timeout for a single sub-query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for enabling sub-queries on a script engine.
pub struct SubQueryOptions {
    /// The model client answering sub-queries.
    pub client: Arc<dyn LlmClient>,
    /// Handle of the runtime that owns the session.
    pub runtime: tokio::runtime::Handle,
    /// Per-iteration call budget.
    pub budget: u32,
    /// Default per-call timeout.
    pub timeout: Duration,
    /// Optional execution-event sink.
    pub callback: Option<ExecutionCallback>,
}

impl SubQueryOptions {
    /// Options with the default budget and timeout.
    pub fn new(client: Arc<dyn LlmClient>, runtime: tokio::runtime::Handle) -> Self {
        Self {
            client,
            runtime,
            budget: DEFAULT_BUDGET,
            timeout: DEFAULT_TIMEOUT,
            callback: None,
        }
    }
}

/// Marshals sub-queries from the executor thread onto the owning runtime.
pub struct SubQueryHub {
    client: Arc<dyn LlmClient>,
    runtime: tokio::runtime::Handle,
    budget: u32,
    default_timeout: Duration,
    used: AtomicU32,
    callback: Option<ExecutionCallback>,
}

impl SubQueryHub {
    /// Build a hub from options.
    pub fn new(options: SubQueryOptions) -> Self {
        Self {
            client: options.client,
            runtime: options.runtime,
            budget: options.budget,
            default_timeout: options.timeout,
            used: AtomicU32::new(0),
            callback: options.callback,
        }
    }

    /// The configured per-iteration budget.
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Sub-queries issued since the last reset.
    pub fn count(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    /// Reset the per-iteration counter.
    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }

    /// Default timeout applied when the script does not pass one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Reserve `n` calls against the budget, or fail without charging.
    fn charge(&self, n: u32) -> Result<(), String> {
        let used = self.used.load(Ordering::SeqCst);
        if used + n > self.budget {
            return Err(format!(
                "llm_query budget exceeded: {used} of {} used this iteration, {n} more requested",
                self.budget
            ));
        }
        self.used.fetch_add(n, Ordering::SeqCst);
        Ok(())
    }

    fn emit(&self, prompts: usize) {
        if let Some(callback) = &self.callback {
            callback(
                &ExecutionEvent::new(ExecutionEventType::LlmSubQuery).with_metadata(
                    serde_json::json!({"prompts": prompts, "used": self.count()}),
                ),
            );
        }
    }

    /// Issue one sub-query, blocking the calling (worker) thread.
    pub fn query(&self, prompt: &str, timeout: Duration) -> Result<String, String> {
        self.charge(1)?;
        self.emit(1);
        let client = Arc::clone(&self.client);
        let messages = vec![ChatMessage::user(prompt)];
        let result = self.runtime.block_on(async move {
            tokio::time::timeout(timeout, client.chat(&messages, None)).await
        });
        match result {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(err)) => Err(format!("llm_query failed: {err}")),
            Err(_) => Err(format!("llm_query timed out after {timeout:?}")),
        }
    }

    /// Issue up to [`MAX_BATCH`] sub-queries concurrently; the batch counts
    /// against the budget once per prompt.
    pub fn query_batched(
        &self,
        prompts: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<String>, String> {
        if prompts.len() > MAX_BATCH {
            return Err(format!(
                "llm_query_batched accepts at most {MAX_BATCH} prompts, got {}",
                prompts.len()
            ));
        }
        self.charge(prompts.len() as u32)?;
        self.emit(prompts.len());
        let client = Arc::clone(&self.client);
        let result = self.runtime.block_on(async move {
            let futures = prompts.into_iter().map(|prompt| {
                let client = Arc::clone(&client);
                async move {
                    let messages = vec![ChatMessage::user(prompt)];
                    tokio::time::timeout(timeout, client.chat(&messages, None)).await
                }
            });
            join_all(futures).await
        });

        result
            .into_iter()
            .map(|entry| match entry {
                Ok(Ok(response)) => Ok(response.content),
                Ok(Err(err)) => Err(format!("llm_query failed: {err}")),
                Err(_) => Err(format!("llm_query timed out after {timeout:?}")),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyrm_llm::MockClient;

    fn hub(budget: u32) -> Arc<SubQueryHub> {
        let mut options = SubQueryOptions::new(
            Arc::new(MockClient::with_default_text("answer")),
            tokio::runtime::Handle::current(),
        );
        options.budget = budget;
        Arc::new(SubQueryHub::new(options))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn query_answers_and_counts() {
        let hub = hub(3);
        let hub_clone = Arc::clone(&hub);
        let answer = tokio::task::spawn_blocking(move || {
            hub_clone.query("what is the pc?", Duration::from_secs(5))
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(answer, "answer");
        assert_eq!(hub.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn budget_exhaustion_fails_without_charging() {
        let hub = hub(1);
        let hub_clone = Arc::clone(&hub);
        tokio::task::spawn_blocking(move || {
            hub_clone.query("one", Duration::from_secs(5)).unwrap();
            let err = hub_clone.query("two", Duration::from_secs(5)).unwrap_err();
            assert!(err.contains("budget exceeded"));
        })
        .await
        .unwrap();
        assert_eq!(hub.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_counts_each_prompt() {
        let hub = hub(5);
        let hub_clone = Arc::clone(&hub);
        let answers = tokio::task::spawn_blocking(move || {
            hub_clone.query_batched(
                vec!["a".into(), "b".into(), "c".into()],
                Duration::from_secs(5),
            )
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(answers.len(), 3);
        assert_eq!(hub.count(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_batch_is_rejected() {
        let hub = hub(10);
        let hub_clone = Arc::clone(&hub);
        let err = tokio::task::spawn_blocking(move || {
            let prompts = (0..6).map(|i| format!("p{i}")).collect();
            hub_clone.query_batched(prompts, Duration::from_secs(5))
        })
        .await
        .unwrap()
        .unwrap_err();
        assert!(err.contains("at most 5"));
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_clears_counter() {
        let hub = hub(2);
        let hub_clone = Arc::clone(&hub);
        tokio::task::spawn_blocking(move || {
            hub_clone.query("one", Duration::from_secs(5)).unwrap();
        })
        .await
        .unwrap();
        assert_eq!(hub.count(), 1);
        hub.reset();
        assert_eq!(hub.count(), 0);
    }
}
