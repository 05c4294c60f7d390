//! Session — binds a debugger target/process to the wyrm primitives.

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use wyrm_bridge::{DebugBackend, Debugger, LaunchSpec, Process, Target};
use wyrm_cache::{ContentCache, FileStorage};
use wyrm_llm::{
    AgenticResult, InstrumentedClient, LlmClient, LlmEventCallback, ToolExecutor,
    create_agentic_client, create_client,
};
use wyrm_script::ScriptTool;
use wyrm_script::events::ExecutionCallback;

use crate::agent::handler::AgentHandler;
use crate::agent::repl::{ReplAgent, ReplOptions};
use crate::agent::strategies::AgentStrategy;
use crate::agent::tools::agent_tools;
use crate::config::WyrmConfig;
use crate::error::SessionError;
use crate::primitives::{ActHandler, ExtractHandler, ObserveHandler};
use crate::types::{ActResult, AgentStep, ObserveResult, ReplResult};

/// A session binding one debugger, one target, one process, one cache, and
/// the primitive handlers.
///
/// Lifecycle: `start(path)` or `attach(pid)` -> primitives -> `end()`.
/// Callers serialize primitive calls; no two run concurrently on one
/// session.
pub struct Session {
    config: WyrmConfig,
    debugger: Debugger,
    client: Arc<dyn LlmClient>,
    cache: Option<Arc<ContentCache>>,
    execution_callback: Option<ExecutionCallback>,
    target: Option<Target>,
    process: Option<Process>,
    act_handler: Option<ActHandler>,
    observe_handler: ObserveHandler,
    extract_handler: ExtractHandler,
    persistent_repl: Option<ReplAgent>,
}

impl Session {
    /// Create a session over a debugger backend.
    ///
    /// The backend is the seam to the real debugger adapter; tests inject a
    /// scripted one. When `llm_event_callback` is given, every provider call
    /// is instrumented with start/end events.
    pub fn new(
        config: WyrmConfig,
        backend: Arc<dyn DebugBackend>,
        llm_event_callback: Option<LlmEventCallback>,
        execution_callback: Option<ExecutionCallback>,
    ) -> Result<Self, SessionError> {
        let raw_client = create_client(&config.model_config()?);
        let client: Arc<dyn LlmClient> = match llm_event_callback {
            Some(callback) => Arc::new(InstrumentedClient::new(raw_client, callback)),
            None => raw_client,
        };

        let cache = config
            .cache
            .enabled
            .then(|| {
                Arc::new(ContentCache::new(FileStorage::new(
                    config.cache.directory.clone(),
                )))
            });

        let observe_handler = ObserveHandler::new(
            Arc::clone(&client),
            cache.clone(),
            execution_callback.clone(),
        );
        let extract_handler = ExtractHandler::new(
            Arc::clone(&client),
            cache.clone(),
            execution_callback.clone(),
        );

        Ok(Self {
            config,
            debugger: Debugger::new(backend),
            client,
            cache,
            execution_callback,
            target: None,
            process: None,
            act_handler: None,
            observe_handler,
            extract_handler,
            persistent_repl: None,
        })
    }

    /// Create a session with an externally constructed client (tests).
    pub fn with_client(
        config: WyrmConfig,
        backend: Arc<dyn DebugBackend>,
        client: Arc<dyn LlmClient>,
        execution_callback: Option<ExecutionCallback>,
    ) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| {
                Arc::new(ContentCache::new(FileStorage::new(
                    config.cache.directory.clone(),
                )))
            });
        let observe_handler = ObserveHandler::new(
            Arc::clone(&client),
            cache.clone(),
            execution_callback.clone(),
        );
        let extract_handler = ExtractHandler::new(
            Arc::clone(&client),
            cache.clone(),
            execution_callback.clone(),
        );
        Self {
            config,
            debugger: Debugger::new(backend),
            client,
            cache,
            execution_callback,
            target: None,
            process: None,
            act_handler: None,
            observe_handler,
            extract_handler,
            persistent_repl: None,
        }
    }

    fn init_handlers(&mut self) {
        let (Some(target), Some(process)) = (self.target.clone(), self.process.clone()) else {
            return;
        };
        self.act_handler = Some(ActHandler::new(
            Arc::clone(&self.client),
            self.debugger.clone(),
            target,
            process,
            self.config.self_heal,
            self.config.healing.max_retries,
            self.execution_callback.clone(),
            self.cache.clone(),
        ));
        self.persistent_repl = None;
    }

    /// Create a target and launch it.
    pub fn start(&mut self, target_path: &str, args: Vec<String>) -> Result<(), SessionError> {
        let target = self.debugger.create_target(target_path)?;
        let process = target.launch(LaunchSpec {
            args,
            ..Default::default()
        })?;
        tracing::info!(target_path, pid = process.pid(), "started target");
        self.target = Some(target);
        self.process = Some(process);
        self.init_handlers();
        Ok(())
    }

    /// Attach to a running process.
    pub fn attach(&mut self, pid: u64) -> Result<(), SessionError> {
        let (target, process) = self.debugger.attach(pid)?;
        tracing::info!(pid, "attached");
        self.target = Some(target);
        self.process = Some(process);
        self.init_handlers();
        Ok(())
    }

    /// Attach to a running process by name.
    pub fn attach_by_name(&mut self, name: &str) -> Result<(), SessionError> {
        let (target, process) = self.debugger.attach_by_name(name)?;
        tracing::info!(name, pid = process.pid(), "attached by name");
        self.target = Some(target);
        self.process = Some(process);
        self.init_handlers();
        Ok(())
    }

    /// The live process.
    pub fn process(&self) -> Result<&Process, SessionError> {
        self.process.as_ref().ok_or(SessionError::NoProcess)
    }

    /// The live target.
    pub fn target(&self) -> Result<&Target, SessionError> {
        self.target.as_ref().ok_or(SessionError::NoProcess)
    }

    /// Execute a natural language debugging instruction.
    pub async fn act(&mut self, instruction: &str) -> Result<ActResult, SessionError> {
        let handler = self.act_handler.as_ref().ok_or(SessionError::NoProcess)?;
        handler.act(instruction).await
    }

    /// Observe the current state and suggest actions.
    pub async fn observe(
        &mut self,
        instruction: Option<&str>,
    ) -> Result<ObserveResult, SessionError> {
        let process = self.process.clone().ok_or(SessionError::NoProcess)?;
        let target = self.target.clone().ok_or(SessionError::NoProcess)?;
        self.observe_handler
            .observe(&process, &target, instruction)
            .await
    }

    /// Extract structured data from the current process state.
    pub async fn extract<T>(&mut self, instruction: &str) -> Result<T, SessionError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let process = self.process.clone().ok_or(SessionError::NoProcess)?;
        let target = self.target.clone().ok_or(SessionError::NoProcess)?;
        self.extract_handler
            .extract(&process, &target, instruction)
            .await
    }

    /// Run the autonomous agent on a task.
    ///
    /// With `agent.agentic_provider` configured, the reason/act loop is
    /// delegated to the external SDK-managed agent; tool calls still execute
    /// in-process and the tool-call log converts back into agent steps.
    pub async fn agent(
        &mut self,
        task: &str,
        strategy: Option<&str>,
        max_steps: Option<u32>,
        timeout: Option<Duration>,
    ) -> Result<Vec<AgentStep>, SessionError> {
        let process = self.process.clone().ok_or(SessionError::NoProcess)?;
        let target = self.target.clone().ok_or(SessionError::NoProcess)?;

        let settings = &self.config.agent;
        let strategy = AgentStrategy::parse(strategy.unwrap_or(&settings.strategy));
        let max_steps = max_steps.unwrap_or(settings.max_steps);
        let timeout = timeout.unwrap_or(Duration::from_secs_f64(settings.timeout));

        let handler = Arc::new(AgentHandler::new(
            Arc::clone(&self.client),
            self.debugger.clone(),
            target,
            process,
            strategy,
            max_steps,
            timeout,
        ));

        if let Some(provider) = &settings.agentic_provider {
            let agentic = create_agentic_client(
                provider,
                settings.agentic_model.clone(),
                settings.agentic_api_key.clone(),
                settings.agentic_cli_path.clone(),
            )?;

            let executor_handler = Arc::clone(&handler);
            let executor: ToolExecutor = Arc::new(move |name, arguments| {
                let handler = Arc::clone(&executor_handler);
                Box::pin(async move { handler.execute_tool(&name, &arguments).await })
            });

            let result = agentic
                .run_agent(task, &agent_tools(), executor, max_steps)
                .await?;
            return Ok(agentic_steps(result));
        }

        handler.run(task).await
    }

    /// Run the REPL agent on a task.
    ///
    /// With `persistent` the agent (namespace and chat history) is kept on
    /// the session and reused by subsequent calls.
    pub async fn repl_agent(
        &mut self,
        task: &str,
        max_iterations: Option<u32>,
        tools: Vec<ScriptTool>,
        persistent: bool,
    ) -> Result<ReplResult, SessionError> {
        let process = self.process.clone().ok_or(SessionError::NoProcess)?;
        let target = self.target.clone().ok_or(SessionError::NoProcess)?;

        let options = ReplOptions {
            max_iterations: max_iterations.unwrap_or(30),
            tools,
            persistent,
            ..Default::default()
        };

        if persistent {
            if self.persistent_repl.is_none() {
                self.persistent_repl = Some(ReplAgent::new(
                    Arc::clone(&self.client),
                    self.debugger.clone(),
                    target,
                    process,
                    options,
                    self.execution_callback.clone(),
                )?);
            }
            let agent = self
                .persistent_repl
                .as_mut()
                .expect("persistent repl agent just installed");
            return agent.run(task).await;
        }

        let mut agent = ReplAgent::new(
            Arc::clone(&self.client),
            self.debugger.clone(),
            target,
            process,
            options,
            self.execution_callback.clone(),
        )?;
        agent.run(task).await
    }

    /// End the session: kill the process, destroy the debugger, drop
    /// handlers.
    pub fn end(&mut self) {
        if let Some(process) = &self.process {
            if let Err(err) = process.kill() {
                tracing::warn!(%err, "failed to kill process during end()");
            }
        }
        self.process = None;
        self.target = None;
        self.act_handler = None;
        self.persistent_repl = None;
        self.debugger.destroy();
        tracing::info!("session ended");
    }
}

/// Convert an agentic tool-call log into agent steps.
fn agentic_steps(result: AgenticResult) -> Vec<AgentStep> {
    let mut steps: Vec<AgentStep> = result
        .tool_calls
        .iter()
        .enumerate()
        .map(|(index, call)| AgentStep {
            step_number: index as u32 + 1,
            action: format!("{}({})", call.name, call.arguments),
            observation: call.result.clone(),
            reasoning: String::new(),
        })
        .collect();
    if steps.is_empty() {
        steps.push(AgentStep {
            step_number: 1,
            action: "done".into(),
            observation: result.result.clone(),
            reasoning: result.result,
        });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheSettings, WyrmConfig};
    use serde_json::json;
    use wyrm_bridge::{ProcessState, ScriptedBackend, ScriptedState};
    use wyrm_llm::{AgenticToolCall, MockClient};

    fn no_cache_config() -> WyrmConfig {
        WyrmConfig {
            cache: CacheSettings {
                enabled: false,
                directory: String::new(),
            },
            ..Default::default()
        }
    }

    fn session_with(client: Arc<MockClient>) -> (Session, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend::new(ScriptedState::sample()));
        let session = Session::with_client(no_cache_config(), backend.clone(), client, None);
        (session, backend)
    }

    #[tokio::test]
    async fn primitives_before_attach_are_no_process_errors() {
        let (mut session, _) = session_with(Arc::new(MockClient::with_texts(vec![])));
        assert!(matches!(
            session.act("anything").await,
            Err(SessionError::NoProcess)
        ));
        assert!(matches!(
            session.observe(None).await,
            Err(SessionError::NoProcess)
        ));
    }

    #[tokio::test]
    async fn start_act_end_lifecycle() {
        let client = Arc::new(MockClient::with_values(vec![json!({
            "code": "print(hex(frame.pc))",
            "reasoning": "show pc",
        })]));
        let (mut session, backend) = session_with(client);

        session.start("/bin/demo", vec![]).unwrap();
        let result = session.act("show the current pc").await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("0x100003f00"));

        session.end();
        assert!(session.debugger.is_destroyed());
        assert_eq!(
            backend.with_state(|s| s.state),
            ProcessState::Exited
        );
        assert!(matches!(
            session.act("again").await,
            Err(SessionError::NoProcess)
        ));
    }

    #[tokio::test]
    async fn agent_runs_local_tool_loop() {
        let client = Arc::new(MockClient::with_responses(vec![wyrm_llm::LlmResponse {
            content: "finishing".into(),
            tool_calls: Some(vec![wyrm_llm::ToolCall {
                id: "tc_1".into(),
                name: "done".into(),
                arguments: json!({"result": "nothing to do"}),
            }]),
            usage: None,
        }]));
        let (mut session, _) = session_with(client);
        session.attach(4242).unwrap();

        let steps = session.agent("quick check", None, None, None).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].observation, "nothing to do");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repl_agent_round_trip() {
        let client = Arc::new(MockClient::with_texts(vec![
            "```rhai\ndone(\"quick answer\")\n```",
        ]));
        let (mut session, _) = session_with(client);
        session.attach(4242).unwrap();

        let result = session
            .repl_agent("solve it", Some(5), Vec::new(), false)
            .await
            .unwrap();
        assert_eq!(result.result, "quick answer");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn persistent_repl_is_reused() {
        let client = Arc::new(MockClient::with_texts(vec![
            "```rhai\nlet marker = 7;\ndone(\"one\")\n```",
            "```rhai\nprint(marker);\ndone(\"two\")\n```",
        ]));
        let (mut session, _) = session_with(client);
        session.attach(4242).unwrap();

        let first = session
            .repl_agent("first", None, Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(first.result, "one");

        let second = session
            .repl_agent("second", None, Vec::new(), true)
            .await
            .unwrap();
        assert_eq!(second.result, "two");
        assert_eq!(second.iterations[0].code_blocks[0].stdout, "7\n");
    }

    #[test]
    fn agentic_log_converts_to_steps() {
        let result = AgenticResult {
            result: "all done".into(),
            steps: 2,
            tool_calls: vec![
                AgenticToolCall {
                    name: "act".into(),
                    arguments: json!({"instruction": "bt"}),
                    result: "frame #0".into(),
                },
                AgenticToolCall {
                    name: "done".into(),
                    arguments: json!({"result": "all done"}),
                    result: "all done".into(),
                },
            ],
        };
        let steps = agentic_steps(result);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_number, 1);
        assert!(steps[0].action.starts_with("act("));
    }

    #[test]
    fn empty_agentic_log_synthesizes_done_step() {
        let steps = agentic_steps(AgenticResult {
            result: "nothing happened".into(),
            steps: 0,
            tool_calls: vec![],
        });
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "done");
        assert_eq!(steps[0].observation, "nothing happened");
    }
}
