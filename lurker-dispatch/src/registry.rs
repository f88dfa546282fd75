//! Ordered handler registry
//!
//! Handlers are kept in registration order, which is the order they see
//! each frame. Names are unique; a handler can be disabled without losing
//! its slot.

use lurker_core::{Error, Result};
use tracing::{info, warn};

use crate::handler::Handler;

/// Information about a registered handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    pub name: &'static str,
    pub enabled: bool,
    /// Position in dispatch order
    pub position: usize,
}

struct Entry {
    handler: Box<dyn Handler>,
    enabled: bool,
}

/// Registry of protocol handlers
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<Entry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an enabled handler
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] when a handler with the same name is
    /// registered.
    pub fn register(&mut self, handler: Box<dyn Handler>) -> Result<()> {
        let name = handler.name();
        if self.contains(name) {
            warn!(handler = name, "Handler already registered");
            return Err(Error::AlreadyExists(format!(
                "handler '{}' already registered",
                name
            )));
        }

        info!(handler = name, position = self.entries.len(), "Registering handler");
        self.entries.push(Entry {
            handler,
            enabled: true,
        });
        Ok(())
    }

    /// Enable or disable a handler by name
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.handler.name() == name)
            .ok_or_else(|| Error::NotFound(format!("handler '{}' not registered", name)))?;

        if entry.enabled != enabled {
            info!(handler = name, enabled, "Handler toggled");
        }
        entry.enabled = enabled;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Handler> {
        self.entries
            .iter()
            .find(|e| e.handler.name() == name)
            .map(|e| e.handler.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.enabled && e.handler.name() == name)
    }

    /// Enabled handlers in dispatch order
    pub fn enabled(&self) -> impl Iterator<Item = &dyn Handler> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.handler.as_ref())
    }

    pub fn list(&self) -> Vec<HandlerInfo> {
        self.entries
            .iter()
            .enumerate()
            .map(|(position, e)| HandlerInfo {
                name: e.handler.name(),
                enabled: e.enabled,
                position,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every handler's shutdown hook, enabled or not
    ///
    /// Failures are logged; every hook runs regardless.
    pub fn shutdown_all(&self) -> usize {
        let mut failures = 0;
        for entry in &self.entries {
            if let Err(e) = entry.handler.shutdown() {
                warn!(handler = entry.handler.name(), error = %e, "Handler shutdown failed");
                failures += 1;
            }
        }
        failures
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.list()).finish()
    }
}
