//! The [`Thread`] view — stepping controls and frame access.

use std::sync::Arc;

use crate::backend::{DebugBackend, StepMode};
use crate::error::BridgeError;
use crate::frame::Frame;
use crate::types::StopReason;

/// View onto a single thread of the debugged process.
#[derive(Clone)]
pub struct Thread {
    backend: Arc<dyn DebugBackend>,
    tid: u64,
}

impl Thread {
    pub(crate) fn new(backend: Arc<dyn DebugBackend>, tid: u64) -> Self {
        Self { backend, tid }
    }

    /// Thread id.
    pub fn id(&self) -> u64 {
        self.tid
    }

    /// Thread name, if any.
    pub fn name(&self) -> Option<String> {
        self.backend.thread_name(self.tid)
    }

    /// Why the thread is stopped.
    pub fn stop_reason(&self) -> StopReason {
        self.backend.stop_reason(self.tid)
    }

    /// Number of stack frames.
    pub fn num_frames(&self) -> usize {
        self.backend.frame_count(self.tid)
    }

    /// The selected frame.
    pub fn selected_frame(&self) -> Frame {
        let index = self.backend.selected_frame_index(self.tid);
        Frame::new(Arc::clone(&self.backend), self.tid, index)
    }

    /// Stack frames for this thread, optionally capped at `count`.
    pub fn frames(&self, count: Option<usize>) -> Vec<Frame> {
        let total = self.backend.frame_count(self.tid);
        let total = count.map_or(total, |c| total.min(c));
        (0..total)
            .map(|i| Frame::new(Arc::clone(&self.backend), self.tid, i))
            .collect()
    }

    /// Step over the current source line.
    pub fn step_over(&self) -> Result<(), BridgeError> {
        self.backend.step(self.tid, StepMode::Over)
    }

    /// Step into calls on the current source line.
    pub fn step_into(&self) -> Result<(), BridgeError> {
        self.backend.step(self.tid, StepMode::Into)
    }

    /// Step out of the current function.
    pub fn step_out(&self) -> Result<(), BridgeError> {
        self.backend.step(self.tid, StepMode::Out)
    }

    /// Step a single machine instruction.
    pub fn step_instruction(&self) -> Result<(), BridgeError> {
        self.backend.step(self.tid, StepMode::Instruction)
    }

    /// Resume this thread until it reaches `address`.
    pub fn run_to_address(&self, address: u64) -> Result<(), BridgeError> {
        self.backend.run_to_address(self.tid, address)
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread").field("id", &self.tid).finish()
    }
}
