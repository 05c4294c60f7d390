//! The [`Process`] view — execution control and memory access.

use std::sync::Arc;

use crate::backend::DebugBackend;
use crate::error::BridgeError;
use crate::thread::Thread;
use crate::types::{MemoryRegion, ProcessState};

/// View onto the debugged process.
///
/// Cheap to clone; reads go straight to the backend.
#[derive(Clone)]
pub struct Process {
    backend: Arc<dyn DebugBackend>,
}

impl Process {
    pub(crate) fn new(backend: Arc<dyn DebugBackend>) -> Self {
        Self { backend }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn DebugBackend> {
        &self.backend
    }

    /// Current process state.
    pub fn state(&self) -> ProcessState {
        self.backend.process_state()
    }

    /// Process id.
    pub fn pid(&self) -> u64 {
        self.backend.pid()
    }

    /// Exit status, once the process has exited.
    pub fn exit_status(&self) -> Option<i32> {
        self.backend.exit_status()
    }

    /// Textual description of the exit reason.
    pub fn exit_description(&self) -> String {
        self.backend.exit_description()
    }

    /// All threads, in backend order.
    pub fn threads(&self) -> Vec<Thread> {
        self.backend
            .thread_ids()
            .into_iter()
            .map(|tid| Thread::new(Arc::clone(&self.backend), tid))
            .collect()
    }

    /// The selected thread, when one is selected.
    pub fn selected_thread(&self) -> Option<Thread> {
        self.backend
            .selected_thread_id()
            .map(|tid| Thread::new(Arc::clone(&self.backend), tid))
    }

    /// Resume execution.
    pub fn continue_(&self) -> Result<(), BridgeError> {
        self.backend.continue_process()
    }

    /// Halt the process.
    pub fn stop(&self) -> Result<(), BridgeError> {
        self.backend.stop_process()
    }

    /// Kill the process.
    pub fn kill(&self) -> Result<(), BridgeError> {
        self.backend.kill_process()
    }

    /// Detach from the process.
    pub fn detach(&self) -> Result<(), BridgeError> {
        self.backend.detach_process()
    }

    /// Read bytes from the process address space.
    pub fn read_memory(&self, address: u64, size: usize) -> Result<Vec<u8>, BridgeError> {
        self.backend.read_memory(address, size)
    }

    /// Write bytes into the process address space; returns bytes written.
    pub fn write_memory(&self, address: u64, data: &[u8]) -> Result<usize, BridgeError> {
        self.backend.write_memory(address, data)
    }

    /// Enumerate mapped memory regions.
    pub fn memory_regions(&self) -> Vec<MemoryRegion> {
        self.backend.memory_regions()
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid())
            .field("state", &self.state())
            .finish()
    }
}
