//! Per-iteration telemetry for the REPL agent.

use std::path::PathBuf;
use std::time::Instant;

use crate::types::{ReplCodeBlock, ReplIteration};

/// Tracks per-iteration and per-code-block telemetry for a REPL session.
///
/// Optionally appends each finished iteration as a JSONL line to a log file;
/// write failures are logged warnings, never errors.
pub struct ReplLogger {
    log_path: Option<PathBuf>,
    iterations: Vec<ReplIteration>,
    current_step: u32,
    current_response: String,
    current_blocks: Vec<ReplCodeBlock>,
    iteration_started: Instant,
    block_started: Instant,
}

impl ReplLogger {
    /// Create a logger; with a path, iterations are appended as JSONL.
    pub fn new(log_path: Option<PathBuf>) -> Self {
        if let Some(path) = &log_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        Self {
            log_path,
            iterations: Vec::new(),
            current_step: 0,
            current_response: String::new(),
            current_blocks: Vec::new(),
            iteration_started: Instant::now(),
            block_started: Instant::now(),
        }
    }

    /// All finished iterations, in order.
    pub fn iterations(&self) -> Vec<ReplIteration> {
        self.iterations.clone()
    }

    /// Start tracking a new iteration.
    pub fn begin_iteration(&mut self, step_number: u32, llm_response: &str) {
        self.current_step = step_number;
        self.current_response = llm_response.to_string();
        self.current_blocks.clear();
        self.iteration_started = Instant::now();
    }

    /// Mark the start of a code-block execution.
    pub fn begin_code_block(&mut self) {
        self.block_started = Instant::now();
    }

    /// Record a completed code block.
    pub fn end_code_block(
        &mut self,
        code: &str,
        stdout: &str,
        stderr: &str,
        succeeded: bool,
        llm_sub_queries: u32,
    ) {
        self.current_blocks.push(ReplCodeBlock {
            code: code.to_string(),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            succeeded,
            duration: self.block_started.elapsed(),
            llm_sub_queries,
        });
    }

    /// Finalize the current iteration and return its record.
    pub fn end_iteration(&mut self) -> ReplIteration {
        let iteration = ReplIteration {
            step_number: self.current_step,
            llm_response: std::mem::take(&mut self.current_response),
            code_blocks: std::mem::take(&mut self.current_blocks),
            duration: self.iteration_started.elapsed(),
        };
        self.iterations.push(iteration.clone());
        self.write_jsonl(&iteration);
        iteration
    }

    fn write_jsonl(&self, iteration: &ReplIteration) {
        let Some(path) = &self.log_path else {
            return;
        };
        let line = match serde_json::to_string(iteration) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(%err, "failed to serialize REPL log entry");
                return;
            }
        };
        use std::io::Write;
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(err) = result {
            tracing::warn!(%err, "failed to write REPL log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterations_accumulate_blocks() {
        let mut logger = ReplLogger::new(None);
        logger.begin_iteration(1, "looking at registers");
        logger.begin_code_block();
        logger.end_code_block("print(1)", "1\n", "", true, 0);
        logger.begin_code_block();
        logger.end_code_block("boom()", "", "script error", false, 2);
        let iteration = logger.end_iteration();

        assert_eq!(iteration.step_number, 1);
        assert_eq!(iteration.code_blocks.len(), 2);
        assert!(iteration.code_blocks[0].succeeded);
        assert_eq!(iteration.code_blocks[1].llm_sub_queries, 2);
        assert_eq!(logger.iterations().len(), 1);
    }

    #[test]
    fn jsonl_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repl.jsonl");
        let mut logger = ReplLogger::new(Some(path.clone()));

        for step in 1..=2 {
            logger.begin_iteration(step, "response");
            logger.begin_code_block();
            logger.end_code_block("print(1)", "1\n", "", true, 0);
            logger.end_iteration();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: ReplIteration = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.step_number, 1);
    }

    #[test]
    fn missing_log_path_is_silent() {
        let mut logger = ReplLogger::new(None);
        logger.begin_iteration(1, "");
        logger.end_iteration();
        assert_eq!(logger.iterations().len(), 1);
    }
}
