//! # Handler Registry
//!
//! Maps engine topics to the [`TaskHandler`] that serves them. The worker subscribes
//! to exactly the registered topics.

use crate::error::{CaseworkError, Result};
use crate::handler::TaskHandler;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_handlers: usize,
    pub topics: Vec<String>,
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("topics", &self.topics())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its topic; a topic can only be served by one handler
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) -> Result<()> {
        let topic = handler.topic().to_string();
        if topic.is_empty() {
            return Err(CaseworkError::Registry("handler topic is empty".to_string()));
        }
        if self.handlers.contains_key(&topic) {
            return Err(CaseworkError::Registry(format!(
                "topic '{topic}' already has a handler"
            )));
        }

        info!(topic = %topic, "Registered task handler");
        self.handlers.insert(topic, handler);
        Ok(())
    }

    pub fn resolve(&self, topic: &str) -> Option<Arc<dyn TaskHandler>> {
        let handler = self.handlers.get(topic).cloned();
        if handler.is_none() {
            debug!(topic = %topic, "No handler registered for topic");
        }
        handler
    }

    /// Registered topics, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_handlers: self.handlers.len(),
            topics: self.topics(),
        }
    }
}
