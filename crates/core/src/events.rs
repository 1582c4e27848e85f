//! Event bus for cross-cutting side effects
//!
//! A task publishes a payload on a topic; listeners registered for that topic
//! run one after another in registration order. `emit` resolves only once every
//! listener has finished, and the first failure stops the remaining listeners.
//! Emitting on a topic nobody listens to succeeds immediately.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::types::PipewrightResult;

/// Data published by a task
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub topic: String,
    pub source_task: String,
    pub body: String,
}

#[async_trait]
pub trait Listener: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn handle(&self, payload: EventPayload) -> PipewrightResult<()>;
}

#[derive(Default, Clone)]
pub struct EventBus {
    listeners: HashMap<String, Vec<Arc<dyn Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, topic: impl Into<String>, listener: Arc<dyn Listener>) {
        self.listeners.entry(topic.into()).or_default().push(listener);
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.get(topic).map_or(0, Vec::len)
    }

    #[instrument(skip_all, fields(topic = %payload.topic, source = %payload.source_task))]
    pub async fn emit(&self, payload: EventPayload) -> PipewrightResult<()> {
        let Some(listeners) = self.listeners.get(&payload.topic) else {
            debug!("no listeners registered");
            return Ok(());
        };

        for listener in listeners {
            debug!(listener = listener.name(), "delivering event");
            listener.handle(payload.clone()).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: HashMap<&String, Vec<&str>> = self
            .listeners
            .iter()
            .map(|(topic, listeners)| (topic, listeners.iter().map(|l| l.name()).collect()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &topics).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PipewrightError;
    use std::sync::Mutex;

    struct Recorder {
        name: String,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Listener for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, payload: EventPayload) -> PipewrightResult<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, payload.body));
            if self.fail {
                return Err(PipewrightError::Integration(format!("{} failed", self.name)));
            }
            Ok(())
        }
    }

    fn payload(topic: &str) -> EventPayload {
        EventPayload {
            topic: topic.to_string(),
            source_task: "mocha_istanbul:coverage".to_string(),
            body: "lcov".to_string(),
        }
    }

    #[tokio::test]
    async fn test_emit_without_listener_completes() {
        let bus = EventBus::new();
        assert_eq!(bus.listener_count("coverage"), 0);
        bus.emit(payload("coverage")).await.unwrap();
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for name in ["first", "second"] {
            bus.on(
                "coverage",
                Arc::new(Recorder {
                    name: name.to_string(),
                    fail: false,
                    log: log.clone(),
                }),
            );
        }

        bus.emit(payload("coverage")).await.unwrap();
        bus.emit(payload("other")).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first:lcov", "second:lcov"]);
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.on(
            "coverage",
            Arc::new(Recorder {
                name: "upload".to_string(),
                fail: true,
                log: log.clone(),
            }),
        );
        bus.on(
            "coverage",
            Arc::new(Recorder {
                name: "never".to_string(),
                fail: false,
                log: log.clone(),
            }),
        );

        let err = bus.emit(payload("coverage")).await.unwrap_err();
        assert!(matches!(err, PipewrightError::Integration(_)));
        assert_eq!(*log.lock().unwrap(), vec!["upload:lcov"]);
    }
}
