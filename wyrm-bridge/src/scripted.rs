//! Scripted in-memory backend for tests.
//!
//! Provides deterministic process state without a real debugger: memory is a
//! set of mapped byte ranges, stepping advances the top frame's pc by one
//! instruction width, and raw CLI commands are logged and answered from a
//! canned-response table.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::backend::{
    BreakpointLocation, BreakpointSpec, DebugBackend, LaunchSpec, StepMode,
};
use crate::error::BridgeError;
use crate::types::{
    ByteOrder, CommandResult, LineEntry, MemoryRegion, ModuleInfo, ProcessState, RawValue,
    RegisterSet, RegisterValue, ResolvedAddress, StopReason, SymbolHit,
};

/// Instruction width used by scripted stepping.
const INSTRUCTION_WIDTH: u64 = 4;

/// One scripted stack frame.
#[derive(Debug, Clone)]
pub struct ScriptedFrame {
    /// Program counter.
    pub pc: u64,
    /// Stack pointer.
    pub sp: u64,
    /// Frame pointer.
    pub fp: u64,
    /// Function name, when symbolicated.
    pub function_name: Option<String>,
    /// Module name.
    pub module_name: Option<String>,
    /// Source location.
    pub line_entry: Option<LineEntry>,
    /// Register sets reported for this frame.
    pub register_sets: Vec<RegisterSet>,
    /// Raw variables visible in this frame.
    pub variables: Vec<RawValue>,
}

/// One scripted thread.
#[derive(Debug, Clone)]
pub struct ScriptedThread {
    /// Thread id.
    pub id: u64,
    /// Thread name.
    pub name: Option<String>,
    /// Stop reason.
    pub stop_reason: StopReason,
    /// Stack frames, innermost first.
    pub frames: Vec<ScriptedFrame>,
    /// Selected frame index.
    pub selected_frame: usize,
}

#[derive(Debug, Clone)]
struct ScriptedBreakpoint {
    enabled: bool,
    hit_count: u64,
    condition: Option<String>,
    locations: Vec<BreakpointLocation>,
}

/// Mutable scripted state behind [`ScriptedBackend`].
#[derive(Debug)]
pub struct ScriptedState {
    /// Target executable path.
    pub target_path: String,
    /// Target triple.
    pub triple: String,
    /// Pointer width in bytes.
    pub address_byte_size: u32,
    /// Process state label.
    pub state: ProcessState,
    /// Process id.
    pub pid: u64,
    /// Exit status once exited.
    pub exit_status: Option<i32>,
    /// Threads, in order.
    pub threads: Vec<ScriptedThread>,
    /// Index into `threads` of the selected thread.
    pub selected_thread: Option<usize>,
    /// Loaded modules.
    pub modules: Vec<ModuleInfo>,
    /// Known symbols for lookups.
    pub symbols: Vec<SymbolHit>,
    /// Mapped memory chunks: (base address, bytes).
    pub memory: Vec<(u64, Vec<u8>)>,
    /// Reported memory regions.
    pub regions: Vec<MemoryRegion>,
    /// Disassembly text returned for any frame.
    pub disassembly: String,
    /// Canned responses for `execute_command`.
    pub command_responses: HashMap<String, CommandResult>,
    /// Every raw command executed, in order.
    pub command_log: Vec<String>,
    breakpoints: HashMap<u32, ScriptedBreakpoint>,
    next_breakpoint_id: u32,
}

impl ScriptedState {
    /// A stopped arm64 process with one thread, two frames, and a few
    /// symbols — enough state for most façade tests.
    pub fn sample() -> Self {
        let frame0 = ScriptedFrame {
            pc: 0x1_0000_3f00,
            sp: 0x7ff7_b000,
            fp: 0x7ff7_b040,
            function_name: Some("main".into()),
            module_name: Some("demo".into()),
            line_entry: Some(LineEntry {
                file: "/src/demo/main.c".into(),
                line: 42,
                column: Some(5),
            }),
            register_sets: vec![
                RegisterSet {
                    name: "General Purpose Registers".into(),
                    registers: vec![
                        RegisterValue {
                            name: "x0".into(),
                            value: 2,
                            size: 8,
                        },
                        RegisterValue {
                            name: "x1".into(),
                            value: 0x7ff7_b100,
                            size: 8,
                        },
                    ],
                },
                RegisterSet {
                    name: "Control Registers".into(),
                    registers: vec![RegisterValue {
                        name: "pc".into(),
                        value: 0x1_0000_3f00,
                        size: 8,
                    }],
                },
            ],
            variables: vec![
                RawValue {
                    name: "argc".into(),
                    type_name: "int".into(),
                    value: "2".into(),
                    address: Some(0x7ff7_b010),
                    size: Some(4),
                    ..Default::default()
                },
                RawValue {
                    name: "argv".into(),
                    type_name: "char **".into(),
                    value: "0x00007ff7b100".into(),
                    address: Some(0x7ff7_b018),
                    size: Some(8),
                    is_pointer: true,
                    ..Default::default()
                },
            ],
        };
        let frame1 = ScriptedFrame {
            pc: 0x1_8000_0520,
            sp: 0x7ff7_b050,
            fp: 0x7ff7_b090,
            function_name: Some("start".into()),
            module_name: Some("dyld".into()),
            line_entry: None,
            register_sets: Vec::new(),
            variables: Vec::new(),
        };

        Self {
            target_path: "/bin/demo".into(),
            triple: "arm64-apple-macosx15.0.0".into(),
            address_byte_size: 8,
            state: ProcessState::Stopped,
            pid: 4242,
            exit_status: None,
            threads: vec![ScriptedThread {
                id: 1,
                name: Some("main-thread".into()),
                stop_reason: StopReason::Breakpoint,
                frames: vec![frame0, frame1],
                selected_frame: 0,
            }],
            selected_thread: Some(0),
            modules: vec![
                ModuleInfo {
                    name: "demo".into(),
                    path: "/bin/demo".into(),
                    uuid: Some("8E3C-DEMO".into()),
                    base_address: 0x1_0000_0000,
                },
                ModuleInfo {
                    name: "libsystem".into(),
                    path: "/usr/lib/libsystem.dylib".into(),
                    uuid: None,
                    base_address: 0x1_8000_0000,
                },
            ],
            symbols: vec![
                SymbolHit {
                    name: "main".into(),
                    address: 0x1_0000_3f00,
                    module: "demo".into(),
                },
                SymbolHit {
                    name: "process_image".into(),
                    address: 0x1_0000_4200,
                    module: "demo".into(),
                },
                SymbolHit {
                    name: "start".into(),
                    address: 0x1_8000_0500,
                    module: "dyld".into(),
                },
            ],
            memory: vec![(0x2000_0000, vec![0u8; 256])],
            regions: vec![MemoryRegion {
                start: 0x2000_0000,
                end: 0x2000_0100,
                readable: true,
                writable: true,
                executable: false,
                name: Some("[heap]".into()),
            }],
            disassembly: "  0x100003f00: mov x0, #0\n  0x100003f04: ret".into(),
            command_responses: HashMap::new(),
            command_log: Vec::new(),
            breakpoints: HashMap::new(),
            next_breakpoint_id: 1,
        }
    }

    /// Map a chunk of memory at `base`, replacing any chunk with that base.
    pub fn map_memory(&mut self, base: u64, bytes: Vec<u8>) {
        self.memory.retain(|(addr, _)| *addr != base);
        self.memory.push((base, bytes));
    }

    fn chunk_for(&self, address: u64, size: usize) -> Option<(usize, usize)> {
        self.memory.iter().enumerate().find_map(|(i, (base, data))| {
            let end = base + data.len() as u64;
            (address >= *base && address + size as u64 <= end)
                .then(|| (i, (address - base) as usize))
        })
    }

    fn thread(&self, tid: u64) -> Option<&ScriptedThread> {
        self.threads.iter().find(|t| t.id == tid)
    }

    fn frame(&self, tid: u64, index: usize) -> Option<&ScriptedFrame> {
        self.thread(tid).and_then(|t| t.frames.get(index))
    }
}

/// A [`DebugBackend`] backed by [`ScriptedState`].
pub struct ScriptedBackend {
    state: Mutex<ScriptedState>,
}

impl ScriptedBackend {
    /// Wrap a scripted state.
    pub fn new(state: ScriptedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Mutate the scripted state from a test.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ScriptedState) -> R) -> R {
        f(&mut self.state.lock().expect("scripted state poisoned"))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state.lock().expect("scripted state poisoned")
    }
}

impl DebugBackend for ScriptedBackend {
    fn create_target(&self, path: &str) -> Result<(), BridgeError> {
        self.lock().target_path = path.to_string();
        Ok(())
    }

    fn attach(&self, pid: u64) -> Result<(), BridgeError> {
        self.lock().pid = pid;
        Ok(())
    }

    fn attach_by_name(&self, _name: &str) -> Result<u64, BridgeError> {
        Ok(self.lock().pid)
    }

    fn launch(&self, _spec: &LaunchSpec) -> Result<u64, BridgeError> {
        let mut state = self.lock();
        state.state = ProcessState::Stopped;
        Ok(state.pid)
    }

    fn execute_command(&self, command: &str) -> Result<CommandResult, BridgeError> {
        let mut state = self.lock();
        state.command_log.push(command.to_string());
        Ok(state
            .command_responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| CommandResult {
                output: format!("(scripted) {command}"),
                error: String::new(),
                succeeded: true,
            }))
    }

    fn shutdown(&self) {}

    fn target_path(&self) -> String {
        self.lock().target_path.clone()
    }

    fn triple(&self) -> String {
        self.lock().triple.clone()
    }

    fn byte_order(&self) -> ByteOrder {
        ByteOrder::Little
    }

    fn address_byte_size(&self) -> u32 {
        self.lock().address_byte_size
    }

    fn modules(&self) -> Vec<ModuleInfo> {
        self.lock().modules.clone()
    }

    fn find_functions(&self, name: &str) -> Vec<SymbolHit> {
        self.lock()
            .symbols
            .iter()
            .filter(|hit| hit.name == name || hit.name.contains(name))
            .cloned()
            .collect()
    }

    fn find_symbols(&self, name: &str) -> Vec<SymbolHit> {
        self.find_functions(name)
    }

    fn resolve_address(&self, address: u64) -> ResolvedAddress {
        let state = self.lock();
        let enclosing = state
            .symbols
            .iter()
            .filter(|hit| hit.address <= address)
            .max_by_key(|hit| hit.address);
        match enclosing {
            Some(hit) if address - hit.address < 0x1000 => ResolvedAddress {
                address,
                symbol: Some(hit.name.clone()),
                module: Some(hit.module.clone()),
                offset: address - hit.address,
            },
            _ => ResolvedAddress {
                address,
                symbol: None,
                module: None,
                offset: 0,
            },
        }
    }

    fn create_breakpoint(&self, spec: &BreakpointSpec) -> Result<u32, BridgeError> {
        let mut state = self.lock();
        let location = match spec {
            BreakpointSpec::Name { name, .. } => {
                let hit = state
                    .symbols
                    .iter()
                    .find(|h| &h.name == name)
                    .ok_or_else(|| {
                        BridgeError::Breakpoint(format!("no symbol named '{name}'"))
                    })?;
                BreakpointLocation {
                    address: hit.address,
                    module: Some(hit.module.clone()),
                }
            }
            BreakpointSpec::Address(address) => BreakpointLocation {
                address: *address,
                module: None,
            },
            BreakpointSpec::Regex(_) => BreakpointLocation {
                address: 0,
                module: None,
            },
        };
        let id = state.next_breakpoint_id;
        state.next_breakpoint_id += 1;
        state.breakpoints.insert(
            id,
            ScriptedBreakpoint {
                enabled: true,
                hit_count: 0,
                condition: None,
                locations: vec![location],
            },
        );
        Ok(id)
    }

    fn breakpoint_enabled(&self, id: u32) -> bool {
        self.lock()
            .breakpoints
            .get(&id)
            .is_some_and(|bp| bp.enabled)
    }

    fn set_breakpoint_enabled(&self, id: u32, enabled: bool) {
        if let Some(bp) = self.lock().breakpoints.get_mut(&id) {
            bp.enabled = enabled;
        }
    }

    fn breakpoint_hit_count(&self, id: u32) -> u64 {
        self.lock()
            .breakpoints
            .get(&id)
            .map_or(0, |bp| bp.hit_count)
    }

    fn breakpoint_condition(&self, id: u32) -> Option<String> {
        self.lock()
            .breakpoints
            .get(&id)
            .and_then(|bp| bp.condition.clone())
    }

    fn set_breakpoint_condition(&self, id: u32, condition: &str) {
        if let Some(bp) = self.lock().breakpoints.get_mut(&id) {
            bp.condition = Some(condition.to_string());
        }
    }

    fn breakpoint_locations(&self, id: u32) -> Vec<BreakpointLocation> {
        self.lock()
            .breakpoints
            .get(&id)
            .map(|bp| bp.locations.clone())
            .unwrap_or_default()
    }

    fn delete_breakpoint(&self, id: u32) {
        self.lock().breakpoints.remove(&id);
    }

    fn process_state(&self) -> ProcessState {
        self.lock().state
    }

    fn pid(&self) -> u64 {
        self.lock().pid
    }

    fn exit_status(&self) -> Option<i32> {
        self.lock().exit_status
    }

    fn exit_description(&self) -> String {
        match self.lock().exit_status {
            Some(status) => format!("exited with status {status}"),
            None => String::new(),
        }
    }

    fn thread_ids(&self) -> Vec<u64> {
        self.lock().threads.iter().map(|t| t.id).collect()
    }

    fn selected_thread_id(&self) -> Option<u64> {
        let state = self.lock();
        state
            .selected_thread
            .and_then(|i| state.threads.get(i))
            .map(|t| t.id)
    }

    fn continue_process(&self) -> Result<(), BridgeError> {
        // Scripted processes stop again immediately, keeping tests
        // deterministic.
        self.lock().state = ProcessState::Stopped;
        Ok(())
    }

    fn stop_process(&self) -> Result<(), BridgeError> {
        self.lock().state = ProcessState::Stopped;
        Ok(())
    }

    fn kill_process(&self) -> Result<(), BridgeError> {
        let mut state = self.lock();
        state.state = ProcessState::Exited;
        state.exit_status = Some(9);
        Ok(())
    }

    fn detach_process(&self) -> Result<(), BridgeError> {
        self.lock().state = ProcessState::Detached;
        Ok(())
    }

    fn read_memory(&self, address: u64, size: usize) -> Result<Vec<u8>, BridgeError> {
        let state = self.lock();
        match state.chunk_for(address, size) {
            Some((chunk, offset)) => Ok(state.memory[chunk].1[offset..offset + size].to_vec()),
            None => Err(BridgeError::MemoryRead {
                address,
                size,
                reason: "address range not mapped".into(),
            }),
        }
    }

    fn write_memory(&self, address: u64, data: &[u8]) -> Result<usize, BridgeError> {
        let mut state = self.lock();
        match state.chunk_for(address, data.len()) {
            Some((chunk, offset)) => {
                state.memory[chunk].1[offset..offset + data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            None => Err(BridgeError::MemoryWrite {
                address,
                size: data.len(),
                reason: "address range not mapped".into(),
            }),
        }
    }

    fn memory_regions(&self) -> Vec<MemoryRegion> {
        self.lock().regions.clone()
    }

    fn thread_name(&self, tid: u64) -> Option<String> {
        self.lock().thread(tid).and_then(|t| t.name.clone())
    }

    fn stop_reason(&self, tid: u64) -> StopReason {
        self.lock()
            .thread(tid)
            .map_or(StopReason::Invalid, |t| t.stop_reason)
    }

    fn frame_count(&self, tid: u64) -> usize {
        self.lock().thread(tid).map_or(0, |t| t.frames.len())
    }

    fn selected_frame_index(&self, tid: u64) -> usize {
        self.lock().thread(tid).map_or(0, |t| t.selected_frame)
    }

    fn step(&self, tid: u64, _mode: StepMode) -> Result<(), BridgeError> {
        let mut state = self.lock();
        let thread = state
            .threads
            .iter_mut()
            .find(|t| t.id == tid)
            .ok_or_else(|| BridgeError::Process(format!("no thread {tid}")))?;
        if let Some(frame) = thread.frames.first_mut() {
            frame.pc += INSTRUCTION_WIDTH;
        }
        thread.stop_reason = StopReason::PlanComplete;
        Ok(())
    }

    fn run_to_address(&self, tid: u64, address: u64) -> Result<(), BridgeError> {
        let mut state = self.lock();
        let thread = state
            .threads
            .iter_mut()
            .find(|t| t.id == tid)
            .ok_or_else(|| BridgeError::Process(format!("no thread {tid}")))?;
        if let Some(frame) = thread.frames.first_mut() {
            frame.pc = address;
        }
        thread.stop_reason = StopReason::PlanComplete;
        Ok(())
    }

    fn frame_pc(&self, tid: u64, frame: usize) -> u64 {
        self.lock().frame(tid, frame).map_or(0, |f| f.pc)
    }

    fn frame_sp(&self, tid: u64, frame: usize) -> u64 {
        self.lock().frame(tid, frame).map_or(0, |f| f.sp)
    }

    fn frame_fp(&self, tid: u64, frame: usize) -> u64 {
        self.lock().frame(tid, frame).map_or(0, |f| f.fp)
    }

    fn frame_function_name(&self, tid: u64, frame: usize) -> Option<String> {
        self.lock()
            .frame(tid, frame)
            .and_then(|f| f.function_name.clone())
    }

    fn frame_module_name(&self, tid: u64, frame: usize) -> Option<String> {
        self.lock()
            .frame(tid, frame)
            .and_then(|f| f.module_name.clone())
    }

    fn frame_line_entry(&self, tid: u64, frame: usize) -> Option<LineEntry> {
        self.lock()
            .frame(tid, frame)
            .and_then(|f| f.line_entry.clone())
    }

    fn frame_register_sets(&self, tid: u64, frame: usize) -> Vec<RegisterSet> {
        self.lock()
            .frame(tid, frame)
            .map(|f| f.register_sets.clone())
            .unwrap_or_default()
    }

    fn frame_raw_variables(
        &self,
        tid: u64,
        frame: usize,
        arguments: bool,
        locals: bool,
    ) -> Vec<RawValue> {
        if !arguments && !locals {
            return Vec::new();
        }
        self.lock()
            .frame(tid, frame)
            .map(|f| f.variables.clone())
            .unwrap_or_default()
    }

    fn evaluate_expression(&self, _tid: u64, _frame: usize, expression: &str) -> String {
        format!("(scripted) {expression}")
    }

    fn disassemble(&self, _tid: u64, _frame: usize, _count: usize) -> String {
        self.lock().disassembly.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_state_is_stopped_with_one_thread() {
        let backend = ScriptedBackend::new(ScriptedState::sample());
        assert_eq!(backend.process_state(), ProcessState::Stopped);
        assert_eq!(backend.thread_ids(), vec![1]);
    }

    #[test]
    fn canned_command_responses_take_precedence() {
        let backend = ScriptedBackend::new(ScriptedState::sample());
        backend.with_state(|s| {
            s.command_responses.insert(
                "bt".into(),
                CommandResult {
                    output: "frame #0: main".into(),
                    error: String::new(),
                    succeeded: true,
                },
            );
        });
        let result = backend.execute_command("bt").unwrap();
        assert_eq!(result.output, "frame #0: main");
        assert_eq!(backend.with_state(|s| s.command_log.clone()), vec!["bt"]);
    }

    #[test]
    fn kill_marks_process_exited() {
        let backend = ScriptedBackend::new(ScriptedState::sample());
        backend.kill_process().unwrap();
        assert_eq!(backend.process_state(), ProcessState::Exited);
        assert_eq!(backend.exit_status(), Some(9));
    }
}
