//! Service lifecycle event recording.
//!
//! [`EventListener`] is an [`EventSink`] that keeps every event it receives,
//! so callers can check what happened after a startup or teardown.

use std::sync::{Mutex, PoisonError};

use dsvc_runtime::events::{EventSink, ServiceEvent};

/// Records lifecycle events.
#[derive(Debug, Default)]
pub struct EventListener {
    events: Mutex<Vec<ServiceEvent>>,
}

impl EventListener {
    /// Creates an empty listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event received so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<ServiceEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events about one service.
    #[must_use]
    pub fn events_for(&self, service: &str) -> Vec<ServiceEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.service() == service)
            .collect()
    }

    /// Whether `service` published its environment.
    #[must_use]
    pub fn published(&self, service: &str) -> bool {
        self.events_for(service)
            .iter()
            .any(|e| matches!(e, ServiceEvent::Published { .. }))
    }

    /// Services whose containers were stopped, in stop order.
    #[must_use]
    pub fn stopped(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ServiceEvent::Stopping { service, .. } => Some(service),
                _ => None,
            })
            .collect()
    }

    /// Forgets recorded events.
    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl EventSink for EventListener {
    fn emit(&self, event: &ServiceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_filters_events() {
        let listener = EventListener::new();
        listener.emit(&ServiceEvent::Launching {
            service: "db".into(),
            image: "postgres".into(),
        });
        listener.emit(&ServiceEvent::Published {
            service: "db".into(),
            variables: 3,
        });
        listener.emit(&ServiceEvent::WaitingForHealthy { service: "cache".into() });

        assert_eq!(listener.events().len(), 3);
        assert_eq!(listener.events_for("db").len(), 2);
        assert!(listener.published("db"));
        assert!(!listener.published("cache"));

        listener.clear();
        assert!(listener.events().is_empty());
    }
}
