//! The [`Frame`] view — registers, variables, expressions, disassembly.

use std::sync::Arc;

use crate::backend::DebugBackend;
use crate::types::{LineEntry, RawValue, RegisterValue, VariableNode};

/// Maximum depth of recursive variable expansion.
const MAX_EXPANSION_DEPTH: usize = 3;

/// Maximum number of children expanded per node.
const MAX_CHILDREN: usize = 32;

/// View onto a single stack frame.
#[derive(Clone)]
pub struct Frame {
    backend: Arc<dyn DebugBackend>,
    tid: u64,
    index: usize,
}

impl Frame {
    pub(crate) fn new(backend: Arc<dyn DebugBackend>, tid: u64, index: usize) -> Self {
        Self {
            backend,
            tid,
            index,
        }
    }

    /// Program counter.
    pub fn pc(&self) -> u64 {
        self.backend.frame_pc(self.tid, self.index)
    }

    /// Stack pointer.
    pub fn sp(&self) -> u64 {
        self.backend.frame_sp(self.tid, self.index)
    }

    /// Frame pointer.
    pub fn fp(&self) -> u64 {
        self.backend.frame_fp(self.tid, self.index)
    }

    /// Index of this frame in the thread's frame list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the function this frame is in, when symbolicated.
    pub fn function_name(&self) -> Option<String> {
        self.backend.frame_function_name(self.tid, self.index)
    }

    /// Module (shared library) name for this frame.
    pub fn module_name(&self) -> Option<String> {
        self.backend.frame_module_name(self.tid, self.index)
    }

    /// Source location, when debug info is available.
    pub fn line_entry(&self) -> Option<LineEntry> {
        self.backend.frame_line_entry(self.tid, self.index)
    }

    /// All registers, flattened across register sets in backend order.
    pub fn registers(&self) -> Vec<RegisterValue> {
        self.backend
            .frame_register_sets(self.tid, self.index)
            .into_iter()
            .flat_map(|set| set.registers)
            .collect()
    }

    /// Local variables and arguments visible in this frame, expanded.
    pub fn variables(&self) -> Vec<VariableNode> {
        self.backend
            .frame_raw_variables(self.tid, self.index, true, true)
            .iter()
            .map(|raw| expand_variable(raw, 0))
            .collect()
    }

    /// Function arguments for this frame, expanded.
    pub fn arguments(&self) -> Vec<VariableNode> {
        self.backend
            .frame_raw_variables(self.tid, self.index, true, false)
            .iter()
            .map(|raw| expand_variable(raw, 0))
            .collect()
    }

    /// Evaluate an expression in the context of this frame.
    ///
    /// The result is opaque text; errors render as `error: ...` strings.
    pub fn evaluate_expression(&self, expression: &str) -> String {
        self.backend
            .evaluate_expression(self.tid, self.index, expression)
    }

    /// Disassemble `count` instructions starting from the current pc.
    pub fn disassemble(&self, count: usize) -> String {
        self.backend.disassemble(self.tid, self.index, count)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("tid", &self.tid)
            .field("index", &self.index)
            .finish()
    }
}

/// Expand a raw value into a [`VariableNode`], applying the depth and
/// child-count bounds.
///
/// A pointer with exactly one synthetic child is dereferenced one step so the
/// pointee's fields become visible; when that dereference failed the children
/// are left empty.
pub fn expand_variable(raw: &RawValue, depth: usize) -> VariableNode {
    let children_source: &[RawValue] = if raw.is_pointer && raw.children.len() == 1 {
        match &raw.pointee {
            Some(pointee) => &pointee.children,
            None => &[],
        }
    } else {
        &raw.children
    };

    let children = if depth < MAX_EXPANSION_DEPTH {
        children_source
            .iter()
            .take(MAX_CHILDREN)
            .map(|child| expand_variable(child, depth + 1))
            .collect()
    } else {
        Vec::new()
    };

    VariableNode {
        name: raw.name.clone(),
        type_name: raw.type_name.clone(),
        value: raw.value.clone(),
        address: raw.address,
        size: raw.size,
        children,
    }
}
