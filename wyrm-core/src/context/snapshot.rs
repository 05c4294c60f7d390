//! Capture a [`ProcessSnapshot`] from live debugger state.

use wyrm_bridge::{Frame, Process, Target};

use crate::context::{FrameInfo, ProcessSnapshot, RegisterInfo, StackTrace};

/// Capture a snapshot of the current process state.
///
/// With no selected thread the snapshot has empty registers and no stack
/// trace. The frame defaults to the selected thread's selected frame.
pub fn capture_snapshot(
    process: &Process,
    target: &Target,
    frame: Option<&Frame>,
    include_memory_regions: bool,
    disassembly_count: usize,
) -> ProcessSnapshot {
    let thread = process.selected_thread();
    let selected_frame = frame
        .cloned()
        .or_else(|| thread.as_ref().map(|t| t.selected_frame()));

    let registers = selected_frame
        .as_ref()
        .map(|f| {
            f.registers()
                .into_iter()
                .map(|r| RegisterInfo {
                    name: r.name,
                    value: r.value,
                    size: r.size,
                })
                .collect()
        })
        .unwrap_or_default();

    let stack_trace = thread.as_ref().map(|t| StackTrace {
        frames: t
            .frames(None)
            .iter()
            .map(|f| {
                let line_entry = f.line_entry();
                FrameInfo {
                    index: f.index(),
                    function_name: f.function_name(),
                    module_name: f.module_name(),
                    pc: f.pc(),
                    file: line_entry.as_ref().map(|entry| entry.file.clone()),
                    line: line_entry.as_ref().map(|entry| entry.line),
                }
            })
            .collect(),
        thread_id: t.id(),
        thread_name: t.name(),
    });

    let disassembly = selected_frame
        .as_ref()
        .map(|f| f.disassemble(disassembly_count))
        .unwrap_or_default();

    let variables = selected_frame
        .as_ref()
        .map(|f| f.variables())
        .unwrap_or_default();

    let memory_regions = if include_memory_regions {
        process.memory_regions()
    } else {
        Vec::new()
    };

    ProcessSnapshot {
        registers,
        stack_trace,
        memory_regions,
        modules: target.modules(),
        disassembly,
        variables,
        process_state: process.state().label().to_string(),
        stop_reason: thread
            .as_ref()
            .map(|t| t.stop_reason().label().to_string())
            .unwrap_or_default(),
        pc: selected_frame.as_ref().map(|f| f.pc()),
        target_triple: target.triple(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wyrm_bridge::{Debugger, ScriptedBackend, ScriptedState};

    fn attach(state: ScriptedState) -> (Target, Process) {
        let debugger = Debugger::new(Arc::new(ScriptedBackend::new(state)));
        debugger.attach(4242).unwrap()
    }

    #[test]
    fn captures_registers_trace_and_modules() {
        let (target, process) = attach(ScriptedState::sample());
        let snapshot = capture_snapshot(&process, &target, None, false, 20);

        assert_eq!(snapshot.process_state, "stopped");
        assert_eq!(snapshot.stop_reason, "breakpoint");
        assert_eq!(snapshot.pc, Some(0x1_0000_3f00));
        assert!(snapshot.registers.iter().any(|r| r.name == "x0"));
        let trace = snapshot.stack_trace.unwrap();
        assert_eq!(trace.frames.len(), 2);
        assert_eq!(trace.frames[0].function_name.as_deref(), Some("main"));
        assert_eq!(trace.frames[0].line, Some(42));
        assert_eq!(snapshot.modules.len(), 2);
        assert!(snapshot.memory_regions.is_empty());
    }

    #[test]
    fn memory_regions_captured_on_request() {
        let (target, process) = attach(ScriptedState::sample());
        let snapshot = capture_snapshot(&process, &target, None, true, 20);
        assert_eq!(snapshot.memory_regions.len(), 1);
        assert_eq!(
            snapshot.memory_regions[0].name.as_deref(),
            Some("[heap]")
        );
    }

    #[test]
    fn no_selected_thread_yields_empty_registers_and_no_trace() {
        let mut state = ScriptedState::sample();
        state.threads.clear();
        state.selected_thread = None;
        let (target, process) = attach(state);
        let snapshot = capture_snapshot(&process, &target, None, false, 20);

        assert!(snapshot.registers.is_empty());
        assert!(snapshot.stack_trace.is_none());
        assert!(snapshot.pc.is_none());
        assert!(snapshot.stop_reason.is_empty());
        // Target-level data is still present.
        assert_eq!(snapshot.target_triple, "arm64-apple-macosx15.0.0");
    }
}
