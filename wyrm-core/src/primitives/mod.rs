//! The act / observe / extract primitive handlers.

pub mod act;
pub mod extract;
pub mod observe;

pub use act::ActHandler;
pub use extract::ExtractHandler;
pub use observe::ObserveHandler;

use std::sync::{Arc, Mutex};

use wyrm_script::{ExecOutcome, ScriptEngine};

use crate::error::SessionError;

/// Run a fragment on the executor thread so the runtime stays free for
/// reentrant sub-queries.
pub(crate) async fn run_code(
    engine: Arc<Mutex<ScriptEngine>>,
    code: String,
) -> Result<ExecOutcome, SessionError> {
    tokio::task::spawn_blocking(move || {
        let mut engine = engine
            .lock()
            .map_err(|_| SessionError::Task("script engine lock poisoned".into()))?;
        Ok(engine.execute(&code))
    })
    .await
    .map_err(|err| SessionError::Task(err.to_string()))?
}

/// Merge captured stdout and stderr into one output string.
pub(crate) fn combine_output(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}").trim().to_string()
    }
}
