//! Lifecycle event dispatch.
//!
//! Handlers are registered once per [`EventKind`] while building a
//! [`Dispatcher`]; the table is fixed afterwards. Dispatching an event awaits
//! the handler until all of its work has settled.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::stats::InstallStats;
use crate::worker::FetchOutcome;

/// Kinds of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch => "fetch",
        };
        f.write_str(s)
    }
}

/// A lifecycle event delivered to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install,
    Activate,
    /// A request to intercept.
    Fetch(Request),
}

impl Event {
    /// Returns the kind used to look up the handler.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Install => EventKind::Install,
            Self::Activate => EventKind::Activate,
            Self::Fetch(_) => EventKind::Fetch,
        }
    }
}

/// What a handler produced once its work settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Install finished.
    Installed(InstallStats),
    /// Activation finished; names of the deleted stores.
    Activated(Vec<String>),
    /// A fetch was answered.
    Responded(FetchOutcome),
}

/// Handles lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles an event, resolving once its work has settled.
    async fn handle(&self, event: &Event) -> Result<EventOutcome>;
}

/// Collects handler registrations before the table is frozen.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl DispatcherBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for an event kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateHandler`] if the kind already has a handler.
    pub fn register(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Result<Self> {
        if self.handlers.contains_key(&kind) {
            return Err(Error::DuplicateHandler(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(self)
    }

    /// Freezes the handler table.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: self.handlers,
        }
    }
}

static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();

/// Routes events to their registered handlers.
pub struct Dispatcher {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    /// Starts building a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Returns true if a handler is registered for `kind`.
    #[must_use]
    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Delivers an event and waits until its handler has settled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHandler`] if nothing is registered for the event's
    /// kind, or the handler's own error.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome> {
        let kind = event.kind();
        let handler = self.handlers.get(&kind).ok_or(Error::NoHandler(kind))?;
        log::debug!("Dispatching {kind} event");
        handler.handle(&event).await
    }

    /// Installs this dispatcher as the process-wide dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatcherInstalled`] if one was already installed.
    pub fn install_global(self) -> Result<&'static Self> {
        GLOBAL.set(self).map_err(|_| Error::DispatcherInstalled)?;
        GLOBAL.get().ok_or(Error::DispatcherInstalled)
    }

    /// Returns the process-wide dispatcher, if installed.
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        GLOBAL.get()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("Dispatcher")
            .field("handlers", &kinds)
            .finish()
    }
}
