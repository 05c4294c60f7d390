//! The persistent, scaffold-protected script engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rhai::{Dynamic, Engine, Scope};

use wyrm_bridge::{Debugger, Process, Target};

use crate::bindings::{self, msg_err};
use crate::error::ScriptError;
use crate::events::{ExecutionCallback, ExecutionEvent, ExecutionEventType};
use crate::subquery::SubQueryHub;

/// Maximum characters of captured stdout/stderr fed back per execution.
pub const MAX_OUTPUT_CHARS: usize = 20_000;

/// Maximum characters kept per variable in namespace snapshots.
const SNAPSHOT_VALUE_CHARS: usize = 200;

/// Names that belong to the scaffold and may not be shadowed by injected
/// tools: every seed entry and engine function, plus the REPL scaffold
/// entries.
pub const RESERVED_NAMES: &[&str] = &[
    // seed scope entries
    "debugger",
    "target",
    "process",
    "thread",
    "frame",
    // memory utilities
    "read_string",
    "read_pointer",
    "read_u8",
    "read_u16",
    "read_u32",
    "read_u64",
    "write_u8",
    "write_u16",
    "write_u32",
    "write_u64",
    "search_memory",
    // encoding helpers
    "hex",
    "to_hex",
    "from_hex",
    "to_json",
    "parse_json",
    "regex_match",
    "regex_find_all",
    "print",
    "debug",
    // REPL scaffold entries
    "done",
    "final_value",
    "llm_query",
    "llm_query_batched",
];

/// Result of one code execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Captured stdout, truncated to [`MAX_OUTPUT_CHARS`].
    pub stdout: String,
    /// Captured stderr, truncated to [`MAX_OUTPUT_CHARS`].
    pub stderr: String,
    /// Whether the fragment ran without error.
    pub success: bool,
}

/// A termination signal raised by REPL scaffold functions.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplSignal {
    /// `done(text)` was called.
    Done(String),
    /// `final_value(name)` was called and resolved.
    FinalValue {
        /// The variable name.
        name: String,
        /// Its serialized value (repr string when not JSON-serializable).
        value: serde_json::Value,
    },
}

/// A user-supplied helper injected into the namespace.
///
/// Tools take a single dynamic argument and return a dynamic result; errors
/// surface into the script as runtime errors.
#[derive(Clone)]
pub struct ScriptTool {
    /// Callable name inside scripts.
    pub name: String,
    /// Description rendered into prompt docs.
    pub description: String,
    /// The implementation.
    pub func: Arc<dyn Fn(Dynamic) -> Result<Dynamic, String> + Send + Sync>,
}

impl ScriptTool {
    /// Build a tool.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        func: impl Fn(Dynamic) -> Result<Dynamic, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            func: Arc::new(func),
        }
    }
}

#[derive(Debug, Clone)]
enum ControlSignal {
    Done(String),
    FinalVar(String),
}

#[derive(Clone, Default)]
struct IoBuffers {
    stdout: Arc<Mutex<String>>,
    stderr: Arc<Mutex<String>>,
}

impl IoBuffers {
    fn clear(&self) {
        self.stdout.lock().expect("stdout buffer poisoned").clear();
        self.stderr.lock().expect("stderr buffer poisoned").clear();
    }

    fn take(&self) -> (String, String) {
        (
            std::mem::take(&mut *self.stdout.lock().expect("stdout buffer poisoned")),
            std::mem::take(&mut *self.stderr.lock().expect("stderr buffer poisoned")),
        )
    }

    fn push_stdout(&self, text: &str) {
        self.stdout
            .lock()
            .expect("stdout buffer poisoned")
            .push_str(text);
    }

    fn push_stderr(&self, text: &str) {
        self.stderr
            .lock()
            .expect("stderr buffer poisoned")
            .push_str(text);
    }
}

/// Executes model-written Rhai fragments in a persistent namespace seeded
/// with live façade handles.
///
/// Variables persist across [`ScriptEngine::execute`] calls. After every
/// execution the scaffold entries are restored and `thread`/`frame` are
/// refreshed from the process's current selection.
pub struct ScriptEngine {
    engine: Engine,
    scope: Scope<'static>,
    scaffold: HashMap<String, Dynamic>,
    injected: Vec<(String, String)>,
    io: IoBuffers,
    control: Arc<Mutex<Option<ControlSignal>>>,
    pending_signal: Option<ReplSignal>,
    process: Process,
    hub: Option<Arc<SubQueryHub>>,
    callback: Option<ExecutionCallback>,
}

impl ScriptEngine {
    /// Build an engine over live façade handles.
    pub fn new(
        debugger: Debugger,
        target: Target,
        process: Process,
        callback: Option<ExecutionCallback>,
    ) -> Self {
        let mut engine = Engine::new();
        bindings::register_bridge_api(&mut engine);

        let io = IoBuffers::default();
        let stdout = io.clone();
        engine.on_print(move |text| {
            stdout.push_stdout(text);
            stdout.push_stdout("\n");
        });
        let dbg_io = io.clone();
        engine.on_debug(move |text, _source, _pos| {
            dbg_io.push_stdout(text);
            dbg_io.push_stdout("\n");
        });

        let mut this = Self {
            engine,
            scope: Scope::new(),
            scaffold: HashMap::new(),
            injected: Vec::new(),
            io,
            control: Arc::new(Mutex::new(None)),
            pending_signal: None,
            process,
            hub: None,
            callback,
        };

        this.set_scaffold_entry("debugger", Dynamic::from(debugger));
        this.set_scaffold_entry("target", Dynamic::from(target));
        this.set_scaffold_entry("process", Dynamic::from(this.process.clone()));
        this.refresh_views();
        this
    }

    /// Register the REPL scaffold: `done`, `final_value`, and (when a hub is
    /// supplied) `llm_query` / `llm_query_batched`.
    pub fn install_repl_scaffold(&mut self, hub: Option<Arc<SubQueryHub>>) {
        let control = Arc::clone(&self.control);
        self.engine
            .register_fn("done", move |text: &str| -> Result<(), Box<rhai::EvalAltResult>> {
                *control.lock().expect("control state poisoned") =
                    Some(ControlSignal::Done(text.to_string()));
                Err(msg_err("analysis complete"))
            });

        let control = Arc::clone(&self.control);
        self.engine.register_fn(
            "final_value",
            move |name: &str| -> Result<(), Box<rhai::EvalAltResult>> {
                *control.lock().expect("control state poisoned") =
                    Some(ControlSignal::FinalVar(name.to_string()));
                Err(msg_err("analysis complete"))
            },
        );

        if let Some(hub) = hub {
            let h = Arc::clone(&hub);
            self.engine.register_fn(
                "llm_query",
                move |prompt: &str| -> Result<String, Box<rhai::EvalAltResult>> {
                    h.query(prompt, h.default_timeout()).map_err(msg_err)
                },
            );
            let h = Arc::clone(&hub);
            self.engine.register_fn(
                "llm_query",
                move |prompt: &str, timeout_secs: i64| -> Result<String, Box<rhai::EvalAltResult>> {
                    h.query(prompt, std::time::Duration::from_secs(timeout_secs.max(0) as u64))
                        .map_err(msg_err)
                },
            );
            let h = Arc::clone(&hub);
            self.engine.register_fn(
                "llm_query",
                move |prompt: &str, timeout_secs: f64| -> Result<String, Box<rhai::EvalAltResult>> {
                    h.query(prompt, std::time::Duration::from_secs_f64(timeout_secs.max(0.0)))
                        .map_err(msg_err)
                },
            );
            let h = Arc::clone(&hub);
            self.engine.register_fn(
                "llm_query_batched",
                move |prompts: rhai::Array| -> Result<rhai::Array, Box<rhai::EvalAltResult>> {
                    let prompts = array_to_strings(prompts)?;
                    let answers = h
                        .query_batched(prompts, h.default_timeout())
                        .map_err(msg_err)?;
                    Ok(answers.into_iter().map(Dynamic::from).collect())
                },
            );
            let h = Arc::clone(&hub);
            self.engine.register_fn(
                "llm_query_batched",
                move |prompts: rhai::Array,
                      timeout_secs: i64|
                      -> Result<rhai::Array, Box<rhai::EvalAltResult>> {
                    let prompts = array_to_strings(prompts)?;
                    let answers = h
                        .query_batched(
                            prompts,
                            std::time::Duration::from_secs(timeout_secs.max(0) as u64),
                        )
                        .map_err(msg_err)?;
                    Ok(answers.into_iter().map(Dynamic::from).collect())
                },
            );
            self.hub = Some(hub);
        }
    }

    /// Execute a fragment, capturing output.
    ///
    /// Never propagates script failures: errors are formatted into stderr and
    /// reported through `success = false`. Scaffold entries are restored and
    /// `thread`/`frame` refreshed before returning.
    pub fn execute(&mut self, code: &str) -> ExecOutcome {
        self.emit(ExecutionEvent::new(ExecutionEventType::CodeStart).with_code(code));
        self.io.clear();
        *self.control.lock().expect("control state poisoned") = None;
        self.pending_signal = None;

        let start = Instant::now();
        let result = self.engine.run_with_scope(&mut self.scope, code);

        let mut success = true;
        if let Err(err) = result {
            let signal_raised = self
                .control
                .lock()
                .expect("control state poisoned")
                .is_some();
            if !signal_raised {
                success = false;
                tracing::debug!(%err, "script fragment failed");
                self.io.push_stderr(&format!("script error: {err}\n"));
            }
        }

        let signal = self.control.lock().expect("control state poisoned").take();
        match signal {
            Some(ControlSignal::Done(text)) => {
                self.io.push_stdout(&format!("\n[done] {text}\n"));
                self.pending_signal = Some(ReplSignal::Done(text));
            }
            Some(ControlSignal::FinalVar(name)) => match self.lookup(&name) {
                Some(value) => {
                    let serialized = serde_json::to_value(&value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
                    self.io.push_stdout(&format!("\n[final] {name}\n"));
                    self.pending_signal = Some(ReplSignal::FinalValue {
                        name,
                        value: serialized,
                    });
                }
                None => {
                    success = false;
                    self.io.push_stderr(&format!(
                        "final_value error: variable '{name}' is not defined\n"
                    ));
                }
            },
            None => {}
        }

        self.restore_scaffold();
        self.refresh_views();

        let (stdout, stderr) = self.io.take();
        let stdout = truncate_output(stdout);
        let stderr = truncate_output(stderr);
        let duration = start.elapsed();

        let mut end = ExecutionEvent::new(ExecutionEventType::CodeEnd).with_code(code);
        end.stdout = stdout.clone();
        end.stderr = stderr.clone();
        end.succeeded = Some(success);
        end.duration = duration;
        self.emit(end);

        ExecOutcome {
            stdout,
            stderr,
            success,
        }
    }

    /// Register or replace a scaffold entry; every subsequent execution
    /// restores the namespace to this value.
    pub fn update_scaffold(&mut self, name: &str, value: Dynamic) {
        self.set_scaffold_entry(name, value);
    }

    /// Inject custom tools as protected callables.
    ///
    /// Returns `(name, description)` pairs for prompt integration. Fails if
    /// any name collides with a reserved or scaffold name.
    pub fn inject_tools(
        &mut self,
        tools: Vec<ScriptTool>,
    ) -> Result<Vec<(String, String)>, ScriptError> {
        for tool in &tools {
            if RESERVED_NAMES.contains(&tool.name.as_str())
                || self.scaffold.contains_key(&tool.name)
                || self.injected.iter().any(|(name, _)| *name == tool.name)
            {
                return Err(ScriptError::ReservedName(tool.name.clone()));
            }
        }

        let mut descriptions = Vec::new();
        for tool in tools {
            let func = Arc::clone(&tool.func);
            self.engine.register_fn(
                tool.name.clone(),
                move |arg: Dynamic| -> Result<Dynamic, Box<rhai::EvalAltResult>> {
                    func(arg).map_err(msg_err)
                },
            );
            descriptions.push((tool.name.clone(), tool.description.clone()));
            self.injected.push((tool.name, tool.description));
        }
        Ok(descriptions)
    }

    /// Take the termination signal raised by the last execution, if any.
    pub fn take_signal(&mut self) -> Option<ReplSignal> {
        self.pending_signal.take()
    }

    /// Sub-queries issued in the current iteration.
    pub fn sub_query_count(&self) -> u32 {
        self.hub.as_ref().map_or(0, |hub| hub.count())
    }

    /// Reset the per-iteration sub-query counter.
    pub fn reset_sub_queries(&self) {
        if let Some(hub) = &self.hub {
            hub.reset();
        }
    }

    /// Stringified user-defined variables, scaffold names excluded.
    pub fn user_variables(&self) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        for (name, _constant, value) in self.scope.iter() {
            if name.starts_with('_')
                || RESERVED_NAMES.contains(&name)
                || self.scaffold.contains_key(name)
            {
                continue;
            }
            let rendered: String = value.to_string().chars().take(SNAPSHOT_VALUE_CHARS).collect();
            // Later (shadowing) entries win.
            result.insert(name.to_string(), rendered);
        }
        result
    }

    fn lookup(&self, name: &str) -> Option<Dynamic> {
        self.scope
            .iter()
            .filter(|(entry, _, _)| *entry == name)
            .last()
            .map(|(_, _, value)| value)
    }

    fn set_scaffold_entry(&mut self, name: &str, value: Dynamic) {
        self.scaffold.insert(name.to_string(), value.clone());
        set_dynamic(&mut self.scope, name, value);
    }

    fn restore_scaffold(&mut self) {
        for (name, value) in &self.scaffold {
            set_dynamic(&mut self.scope, name, value.clone());
        }
    }

    fn refresh_views(&mut self) {
        match self.process.selected_thread() {
            Some(thread) => {
                let frame = thread.selected_frame();
                self.set_scaffold_entry("thread", Dynamic::from(thread));
                self.set_scaffold_entry("frame", Dynamic::from(frame));
            }
            None => {
                self.set_scaffold_entry("thread", Dynamic::UNIT);
                self.set_scaffold_entry("frame", Dynamic::UNIT);
            }
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }
}

fn set_dynamic(scope: &mut Scope<'static>, name: &str, value: Dynamic) {
    match scope.get_mut(name) {
        Some(slot) => *slot = value,
        None => {
            scope.push_dynamic(name.to_string(), value);
        }
    }
}

fn array_to_strings(array: rhai::Array) -> Result<Vec<String>, Box<rhai::EvalAltResult>> {
    array
        .into_iter()
        .map(|entry| {
            entry
                .into_string()
                .map_err(|t| msg_err(format!("expected string prompt, got {t}")))
        })
        .collect()
}

fn truncate_output(text: String) -> String {
    if text.len() <= MAX_OUTPUT_CHARS {
        return text;
    }
    let total = text.len();
    let kept: String = text.chars().take(MAX_OUTPUT_CHARS).collect();
    format!("{kept}\n... (truncated, {total} chars total)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subquery::{SubQueryHub, SubQueryOptions};
    use std::sync::Arc;
    use wyrm_bridge::{ScriptedBackend, ScriptedState};
    use wyrm_llm::MockClient;

    fn test_engine() -> ScriptEngine {
        test_engine_with(ScriptedState::sample()).0
    }

    fn test_engine_with(state: ScriptedState) -> (ScriptEngine, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend::new(state));
        let debugger = Debugger::new(backend.clone());
        let (target, process) = debugger.attach(4242).unwrap();
        let mut engine = ScriptEngine::new(debugger, target, process, None);
        engine.install_repl_scaffold(None);
        (engine, backend)
    }

    #[test]
    fn print_is_captured() {
        let mut engine = test_engine();
        let outcome = engine.execute(r#"print("hello")"#);
        assert!(outcome.success);
        assert_eq!(outcome.stdout, "hello\n");
        assert!(outcome.stderr.is_empty());
    }

    #[test]
    fn variables_persist_across_fragments() {
        let mut engine = test_engine();
        assert!(engine.execute("let x = 41;").success);
        let outcome = engine.execute("print(x + 1)");
        assert_eq!(outcome.stdout, "42\n");
    }

    #[test]
    fn errors_go_to_stderr_and_engine_survives() {
        let mut engine = test_engine();
        let outcome = engine.execute("no_such_function()");
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("script error"));
        // Engine still usable.
        assert!(engine.execute("print(1)").success);
    }

    #[test]
    fn bridge_handles_are_live() {
        let mut engine = test_engine();
        let outcome = engine.execute("print(process.pid); print(hex(frame.pc));");
        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert!(outcome.stdout.contains("4242"));
        assert!(outcome.stdout.contains("0x100003f00"));
    }

    #[test]
    fn scaffold_restored_after_rebinding() {
        let mut engine = test_engine();
        let outcome = engine.execute(r#"let process = 42; print(process);"#);
        assert!(outcome.success);
        assert_eq!(outcome.stdout, "42\n");
        // The handle is back on the next fragment.
        let outcome = engine.execute("print(process.pid)");
        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "4242\n");
    }

    #[test]
    fn done_still_works_after_shadowing() {
        let mut engine = test_engine();
        assert!(engine.execute(r#"let done = "oops";"#).success);
        let outcome = engine.execute(r#"done("x")"#);
        assert!(outcome.success);
        assert!(outcome.stdout.contains("[done] x"));
        assert_eq!(engine.take_signal(), Some(ReplSignal::Done("x".into())));
    }

    #[test]
    fn done_halts_the_fragment() {
        let mut engine = test_engine();
        let outcome = engine.execute(r#"done("early"); print("unreached");"#);
        assert!(outcome.success);
        assert!(!outcome.stdout.contains("unreached"));
        assert!(matches!(engine.take_signal(), Some(ReplSignal::Done(text)) if text == "early"));
    }

    #[test]
    fn final_value_resolves_namespace_variable() {
        let mut engine = test_engine();
        engine.execute("let leak_size = 956;");
        let outcome = engine.execute(r#"final_value("leak_size")"#);
        assert!(outcome.success);
        match engine.take_signal() {
            Some(ReplSignal::FinalValue { name, value }) => {
                assert_eq!(name, "leak_size");
                assert_eq!(value, serde_json::json!(956));
            }
            other => panic!("expected FinalValue, got {other:?}"),
        }
    }

    #[test]
    fn final_value_on_missing_name_is_an_error() {
        let mut engine = test_engine();
        let outcome = engine.execute(r#"final_value("missing")"#);
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("not defined"));
        assert!(engine.take_signal().is_none());
    }

    #[test]
    fn oversized_output_is_truncated_with_marker() {
        let mut engine = test_engine();
        let outcome = engine.execute(r#"for i in 0..3000 { print("0123456789"); }"#);
        assert!(outcome.success);
        assert!(outcome.stdout.len() < 33_000);
        assert!(outcome.stdout.contains("... (truncated,"));
        assert!(outcome.stdout.contains("chars total)"));
    }

    #[test]
    fn update_scaffold_restores_to_new_value() {
        let mut engine = test_engine();
        engine.update_scaffold("answer", Dynamic::from(42_i64));
        assert_eq!(engine.execute("print(answer)").stdout, "42\n");
        // Fragment rebinds; restore puts the scaffold value back.
        let outcome = engine.execute("answer = 7; print(answer);");
        assert_eq!(outcome.stdout, "7\n");
        assert_eq!(engine.execute("print(answer)").stdout, "42\n");
    }

    #[test]
    fn inject_tools_rejects_reserved_names() {
        let mut engine = test_engine();
        let err = engine
            .inject_tools(vec![ScriptTool::new("process", "", |arg| Ok(arg))])
            .unwrap_err();
        assert!(matches!(err, ScriptError::ReservedName(name) if name == "process"));

        let err = engine
            .inject_tools(vec![ScriptTool::new("llm_query", "", |arg| Ok(arg))])
            .unwrap_err();
        assert!(matches!(err, ScriptError::ReservedName(_)));
    }

    #[test]
    fn injected_tools_are_callable() {
        let mut engine = test_engine();
        let docs = engine
            .inject_tools(vec![ScriptTool::new(
                "checksec",
                "inspect binary protections",
                |arg| Ok(Dynamic::from(format!("checked {arg}"))),
            )])
            .unwrap();
        assert_eq!(docs, vec![("checksec".into(), "inspect binary protections".into())]);
        let outcome = engine.execute(r#"print(checksec("demo"))"#);
        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert!(outcome.stdout.contains("checked demo"));
    }

    #[test]
    fn regex_helpers_are_available() {
        let mut engine = test_engine();
        let outcome = engine.execute(
            r#"
            let text = "main at 0x100003f00, helper at 0x100004200";
            print(regex_match("0x[0-9a-f]+", text));
            print(regex_find_all("0x[0-9a-f]+", text).len());
            "#,
        );
        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "true\n2\n");
    }

    #[test]
    fn user_variables_exclude_scaffold() {
        let mut engine = test_engine();
        engine.execute("let found = 3; let _scratch = 1;");
        let vars = engine.user_variables();
        assert_eq!(vars.get("found").map(String::as_str), Some("3"));
        assert!(!vars.contains_key("process"));
        assert!(!vars.contains_key("_scratch"));
    }

    #[test]
    fn thread_and_frame_are_unit_without_threads() {
        let mut state = ScriptedState::sample();
        state.threads.clear();
        state.selected_thread = None;
        let (mut engine, _backend) = test_engine_with(state);
        let outcome = engine.execute("print(type_of(thread)); print(type_of(frame));");
        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "()\n()\n");
    }

    #[test]
    fn memory_utils_reach_the_backend() {
        let (mut engine, backend) = test_engine_with(ScriptedState::sample());
        backend.with_state(|s| s.map_memory(0x5000, b"wyrm\0tail".to_vec()));
        let outcome = engine.execute(r#"print(read_string(process, 0x5000))"#);
        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout, "wyrm\n");

        let outcome = engine.execute(r#"print(read_u8(process, 0x5000))"#);
        assert_eq!(outcome.stdout, format!("{}\n", b'w'));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn llm_query_blocks_worker_and_returns_answer() {
        let backend = Arc::new(ScriptedBackend::new(ScriptedState::sample()));
        let debugger = Debugger::new(backend);
        let (target, process) = debugger.attach(4242).unwrap();
        let mut engine = ScriptEngine::new(debugger, target, process, None);

        let options = SubQueryOptions::new(
            Arc::new(MockClient::with_default_text("it is a stack canary")),
            tokio::runtime::Handle::current(),
        );
        engine.install_repl_scaffold(Some(Arc::new(SubQueryHub::new(options))));

        let engine = Arc::new(Mutex::new(engine));
        let engine_clone = Arc::clone(&engine);
        let outcome = tokio::task::spawn_blocking(move || {
            engine_clone
                .lock()
                .unwrap()
                .execute(r#"let reply = llm_query("what is 0xdeadbeef?"); print(reply);"#)
        })
        .await
        .unwrap();

        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert!(outcome.stdout.contains("stack canary"));
        assert_eq!(engine.lock().unwrap().sub_query_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn llm_query_budget_error_surfaces_in_stderr() {
        let backend = Arc::new(ScriptedBackend::new(ScriptedState::sample()));
        let debugger = Debugger::new(backend);
        let (target, process) = debugger.attach(4242).unwrap();
        let mut engine = ScriptEngine::new(debugger, target, process, None);

        let mut options = SubQueryOptions::new(
            Arc::new(MockClient::with_default_text("ok")),
            tokio::runtime::Handle::current(),
        );
        options.budget = 1;
        engine.install_repl_scaffold(Some(Arc::new(SubQueryHub::new(options))));

        let engine = Arc::new(Mutex::new(engine));
        let engine_clone = Arc::clone(&engine);
        let outcome = tokio::task::spawn_blocking(move || {
            engine_clone
                .lock()
                .unwrap()
                .execute(r#"llm_query("one"); llm_query("two");"#)
        })
        .await
        .unwrap();

        assert!(!outcome.success);
        assert!(outcome.stderr.contains("budget exceeded"));
        assert_eq!(engine.lock().unwrap().sub_query_count(), 1);
    }
}
