//! Builds and prunes process context for model prompts.

use wyrm_bridge::{Frame, Process, Target, VariableNode};

use crate::context::ProcessSnapshot;
use crate::context::snapshot::capture_snapshot;

/// Modules kept after pruning.
const PRUNED_MODULES: usize = 10;
/// Stack frames kept after pruning.
const PRUNED_FRAMES: usize = 10;
/// Disassembly characters kept after pruning.
const PRUNED_DISASSEMBLY_CHARS: usize = 500;
/// Variables kept after pruning.
const PRUNED_VARIABLES: usize = 10;

/// Builds pruned process snapshots and renders them for prompts.
///
/// Pruning drops the least important context first and stops as soon as the
/// estimated token footprint fits the budget.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_tokens: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self { max_tokens: 4096 }
    }
}

impl ContextBuilder {
    /// A builder with a custom token budget.
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    /// Capture and prune a snapshot.
    pub fn build(
        &self,
        process: &Process,
        target: &Target,
        frame: Option<&Frame>,
        include_memory_regions: bool,
        disassembly_count: usize,
    ) -> ProcessSnapshot {
        let snapshot = capture_snapshot(
            process,
            target,
            frame,
            include_memory_regions,
            disassembly_count,
        );
        self.prune(snapshot)
    }

    /// Prune a snapshot until it fits the token budget.
    ///
    /// Reduction order: memory regions, modules, stack frames, disassembly,
    /// variables. Each step re-estimates and stops at the first fit.
    fn prune(&self, snapshot: ProcessSnapshot) -> ProcessSnapshot {
        if estimate_tokens(&snapshot) <= self.max_tokens {
            return snapshot;
        }

        let mut pruned = snapshot;

        if !pruned.memory_regions.is_empty() {
            pruned.memory_regions.clear();
            if estimate_tokens(&pruned) <= self.max_tokens {
                return pruned;
            }
        }

        if pruned.modules.len() > PRUNED_MODULES {
            pruned.modules.truncate(PRUNED_MODULES);
            if estimate_tokens(&pruned) <= self.max_tokens {
                return pruned;
            }
        }

        if let Some(trace) = &mut pruned.stack_trace {
            if trace.frames.len() > PRUNED_FRAMES {
                trace.frames.truncate(PRUNED_FRAMES);
                if estimate_tokens(&pruned) <= self.max_tokens {
                    return pruned;
                }
            }
        }

        if pruned.disassembly.len() > PRUNED_DISASSEMBLY_CHARS {
            let kept: String = pruned
                .disassembly
                .chars()
                .take(PRUNED_DISASSEMBLY_CHARS)
                .collect();
            pruned.disassembly = format!("{kept}\n... (truncated)");
            if estimate_tokens(&pruned) <= self.max_tokens {
                return pruned;
            }
        }

        if pruned.variables.len() > PRUNED_VARIABLES {
            pruned.variables.truncate(PRUNED_VARIABLES);
        }

        pruned
    }

    /// Format a snapshot as a plaintext block for prompts.
    pub fn format_for_prompt(&self, snapshot: &ProcessSnapshot) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !snapshot.target_triple.is_empty() {
            parts.push(format!("Target: {}", snapshot.target_triple));
            let hints = platform_hints(&snapshot.target_triple);
            if !hints.is_empty() {
                parts.push(format!("\n--- Platform Hints ---\n{hints}"));
            }
        }
        parts.push(format!("Process State: {}", snapshot.process_state));
        parts.push(format!("Stop Reason: {}", snapshot.stop_reason));
        if let Some(pc) = snapshot.pc {
            parts.push(format!("PC: {pc:#x}"));
        }

        if !snapshot.registers.is_empty() {
            parts.push("\n--- Registers ---".into());
            for register in &snapshot.registers {
                parts.push(format!("  {} = {:#x}", register.name, register.value));
            }
        }

        if let Some(trace) = &snapshot.stack_trace {
            parts.push(format!("\n--- Stack Trace (thread {}) ---", trace.thread_id));
            for frame in &trace.frames {
                let location = frame
                    .function_name
                    .clone()
                    .unwrap_or_else(|| format!("{:#x}", frame.pc));
                let module = frame
                    .module_name
                    .as_ref()
                    .map(|m| format!(" [{m}]"))
                    .unwrap_or_default();
                let source = match (&frame.file, frame.line) {
                    (Some(file), Some(line)) => format!(" at {file}:{line}"),
                    _ => String::new(),
                };
                parts.push(format!("  #{}: {location}{module}{source}", frame.index));
            }
        }

        if !snapshot.disassembly.is_empty() {
            parts.push("\n--- Disassembly ---".into());
            parts.push(snapshot.disassembly.clone());
        }

        if !snapshot.variables.is_empty() {
            parts.push("\n--- Variables ---".into());
            format_variables(&snapshot.variables, &mut parts, 2);
        }

        if !snapshot.modules.is_empty() {
            parts.push(format!("\n--- Modules ({}) ---", snapshot.modules.len()));
            for module in snapshot.modules.iter().take(PRUNED_MODULES) {
                parts.push(format!("  {} @ {:#x}", module.name, module.base_address));
            }
        }

        parts.join("\n")
    }
}

/// Rough token estimate: serialized length over four.
pub fn estimate_tokens(snapshot: &ProcessSnapshot) -> usize {
    serde_json::to_string(snapshot).map_or(0, |text| text.len() / 4)
}

/// Architecture-keyed calling-convention hints.
fn platform_hints(target_triple: &str) -> String {
    let triple = target_triple.to_lowercase();
    if triple.contains("arm64") || triple.contains("aarch64") {
        "arm64 calling convention: $x0-$x7 = arguments, $x0 = return value, \
         $lr = return address, $fp = frame pointer."
            .into()
    } else if triple.contains("x86_64") || triple.contains("x86-64") {
        "x86_64 calling convention: $rdi, $rsi, $rdx, $rcx, $r8, $r9 = arguments, \
         $rax = return value, $rbp = frame pointer."
            .into()
    } else if triple.contains("x86") || triple.contains("i386") {
        "x86 (32-bit) calling convention: arguments on stack, \
         $eax = return value, $ebp = frame pointer."
            .into()
    } else {
        String::new()
    }
}

/// Recursively format variables with struct-field indentation.
fn format_variables(variables: &[VariableNode], parts: &mut Vec<String>, indent: usize) {
    let prefix = " ".repeat(indent);
    for variable in variables {
        parts.push(format!(
            "{prefix}{}: {} = {}",
            variable.name, variable.type_name, variable.value
        ));
        if !variable.children.is_empty() {
            format_variables(&variable.children, parts, indent + 4);
        }
    }
}
