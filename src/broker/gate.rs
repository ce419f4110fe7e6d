use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide messaging switch, passed explicitly to every component
/// that talks to the broker.
///
/// Clones share the same flag. Separately constructed gates are independent.
/// While the gate is closed, admin operations and publishes succeed without
/// touching the broker and subscriptions do not start.
#[derive(Debug, Clone)]
pub struct BrokerGate {
    enabled: Arc<AtomicBool>,
}

impl BrokerGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl Default for BrokerGate {
    fn default() -> Self {
        Self::new(true)
    }
}
