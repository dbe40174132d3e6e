//! Rate change notifications.

use serde::Serialize;

use crate::phy::MacAddr;

/// Emitted every time a rate is chosen for a new frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateChange {
    /// Nominal data rate of the chosen rate, in bit/s.
    pub data_rate: u64,
    pub peer: MacAddr,
}

type Listener = Box<dyn Fn(RateChange) + Send + 'static>;

/// Registered rate change callbacks, invoked in registration order.
#[derive(Default)]
pub struct RateChangeListeners {
    listeners: Vec<Listener>,
}

impl RateChangeListeners {
    pub fn subscribe(&mut self, listener: impl Fn(RateChange) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&self, change: RateChange) {
        tracing::trace!(peer = %change.peer, data_rate = change.data_rate, "Rate change");
        for listener in &self.listeners {
            listener(change);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for RateChangeListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateChangeListeners")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
