//! The [`Breakpoint`] view and the process-wide callback registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::backend::{BreakpointLocation, DebugBackend};

/// Context passed to a breakpoint callback when its breakpoint is hit.
#[derive(Debug, Clone)]
pub struct BreakpointHit {
    /// Id of the breakpoint that fired.
    pub breakpoint_id: u32,
    /// Thread that hit the breakpoint.
    pub thread_id: u64,
    /// Program counter at the stop.
    pub pc: u64,
}

/// A breakpoint callback. Returns `true` to stop, `false` to auto-continue.
pub type BreakpointCallback = Arc<dyn Fn(&BreakpointHit) -> bool + Send + Sync>;

// The only process-global mutable state in the façade: callbacks keyed by
// breakpoint id, removed when the breakpoint is deleted.
static CALLBACKS: Lazy<Mutex<HashMap<u32, BreakpointCallback>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Dispatch a hit to the registered callback for `id`.
///
/// Returns `true` (stop) when no callback is registered. Backends call this
/// from their stop-event handling.
pub fn dispatch_breakpoint_hit(hit: &BreakpointHit) -> bool {
    let callback = CALLBACKS
        .lock()
        .expect("breakpoint callback registry poisoned")
        .get(&hit.breakpoint_id)
        .cloned();
    match callback {
        Some(cb) => cb(hit),
        None => true,
    }
}

/// View onto a single breakpoint.
#[derive(Clone)]
pub struct Breakpoint {
    backend: Arc<dyn DebugBackend>,
    id: u32,
}

impl Breakpoint {
    pub(crate) fn new(backend: Arc<dyn DebugBackend>, id: u32) -> Self {
        Self { backend, id }
    }

    /// Breakpoint id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether the breakpoint is enabled.
    pub fn enabled(&self) -> bool {
        self.backend.breakpoint_enabled(self.id)
    }

    /// How many times the breakpoint has been hit.
    pub fn hit_count(&self) -> u64 {
        self.backend.breakpoint_hit_count(self.id)
    }

    /// Resolved locations for this breakpoint.
    pub fn locations(&self) -> Vec<BreakpointLocation> {
        self.backend.breakpoint_locations(self.id)
    }

    /// Current condition expression, if any.
    pub fn condition(&self) -> Option<String> {
        self.backend.breakpoint_condition(self.id)
    }

    /// Set a conditional expression; the breakpoint only stops when it
    /// evaluates to true.
    pub fn set_condition(&self, condition: &str) {
        self.backend.set_breakpoint_condition(self.id, condition);
    }

    /// Attach a callback fired when this breakpoint is hit.
    ///
    /// The callback is held in a process-wide registry keyed by breakpoint
    /// id and removed on [`Breakpoint::delete`].
    pub fn set_callback(&self, callback: BreakpointCallback) {
        CALLBACKS
            .lock()
            .expect("breakpoint callback registry poisoned")
            .insert(self.id, callback);
    }

    /// Enable this breakpoint.
    pub fn enable(&self) {
        self.backend.set_breakpoint_enabled(self.id, true);
    }

    /// Disable this breakpoint without deleting it.
    pub fn disable(&self) {
        self.backend.set_breakpoint_enabled(self.id, false);
    }

    /// Remove this breakpoint and its registered callback.
    pub fn delete(self) {
        CALLBACKS
            .lock()
            .expect("breakpoint callback registry poisoned")
            .remove(&self.id);
        self.backend.delete_breakpoint(self.id);
    }
}

impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Breakpoint").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedBackend, ScriptedState};
    use crate::target::Target;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn target() -> Target {
        Target::new(Arc::new(ScriptedBackend::new(ScriptedState::sample())))
    }

    #[test]
    fn enable_disable_roundtrip() {
        let bp = target().breakpoint_create_by_name("main", None).unwrap();
        assert!(bp.enabled());
        bp.disable();
        assert!(!bp.enabled());
        bp.enable();
        assert!(bp.enabled());
    }

    #[test]
    fn condition_set_and_read() {
        let bp = target().breakpoint_create_by_name("main", None).unwrap();
        assert!(bp.condition().is_none());
        bp.set_condition("argc == 2");
        assert_eq!(bp.condition().as_deref(), Some("argc == 2"));
    }

    #[test]
    fn callback_dispatches_and_is_removed_on_delete() {
        let bp = target().breakpoint_create_by_address(0x4000).unwrap();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        bp.set_callback(Arc::new(move |_hit| {
            fired_clone.store(true, Ordering::SeqCst);
            false
        }));

        let hit = BreakpointHit {
            breakpoint_id: bp.id(),
            thread_id: 1,
            pc: 0x4000,
        };
        assert!(!dispatch_breakpoint_hit(&hit));
        assert!(fired.load(Ordering::SeqCst));

        bp.delete();
        // Deleted breakpoints fall back to the stop-by-default path.
        assert!(dispatch_breakpoint_hit(&hit));
    }

    #[test]
    fn unknown_breakpoint_stops_by_default() {
        let hit = BreakpointHit {
            breakpoint_id: 9_999_999,
            thread_id: 1,
            pc: 0,
        };
        assert!(dispatch_breakpoint_hit(&hit));
    }
}
