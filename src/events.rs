//! Lifecycle event bus for flow/burst/classifier state transitions.
//!
//! Replaces the "observable reference-counted controller" pattern named in
//! spec.md §9 DESIGN NOTES with a plain event struct plus a callback
//! registry, generalizing the teacher's `TemplateHooks`/`TemplateEvent`
//! (`template_events.rs`) from "template cache lifecycle" to "tracker/
//! classifier lifecycle".

use std::sync::Arc;

/// A lifecycle event raised by `FlowTracker`, `BurstTracker`, or
/// `TrafficClassifier`.
#[derive(Debug, Clone)]
pub enum AnalyticsEvent {
    FlowCreated { flow_id: u64 },
    FlowEvicted { flow_id: u64 },
    BurstAdvanced { flow_id: u64, burst_id: u64 },
    BurstReset { flow_id: u64, burst_id: u64 },
    ClassifierCacheHit { ip: String },
    ClassifierCacheEvicted { ip: String },
    SignatureReloadFailed { reason: String },
}

type Hook = Arc<dyn Fn(&AnalyticsEvent) + Send + Sync>;

/// Registry of lifecycle-event callbacks, triggered synchronously on the
/// calling thread (no suspension points anywhere in the core, per spec.md §5).
#[derive(Default, Clone)]
pub struct EventHooks {
    hooks: Vec<Hook>,
}

impl std::fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHooks")
            .field("hook_count", &self.hooks.len())
            .finish()
    }
}

impl EventHooks {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register<F>(&mut self, hook: F)
    where
        F: Fn(&AnalyticsEvent) + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
    }

    pub fn trigger(&self, event: AnalyticsEvent) {
        for hook in &self.hooks {
            hook(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
