//! In-process notification bus for supervised process output.
//!
//! Two notification kinds exist: a decoded output line and the single death
//! notification. Listeners register per kind through the typed
//! [`LineListener`] and [`DiedListener`] traits (plain closures implement
//! both) and are invoked synchronously on the task that emits.
//!
//! The bus itself enforces the delivery contract:
//! - `died` is delivered at most once over the bus lifetime.
//! - No `line` is delivered once `died` has been emitted.
//!
//! There is no replay: a listener registered after an event fired never
//! sees it. Listeners may register further listeners and query
//! [`EventBus::has_died`], but must not emit on the bus they are called from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

/// Notification carried by [`EventBus::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One decoded, filtered line of child output.
    Line(String),
    /// The child is no longer usable.
    Died,
}

/// Listener for decoded output lines.
pub trait LineListener: Send + Sync {
    /// Called once per emitted line, in arrival order.
    fn on_line(&self, line: &str);
}

/// Listener for the death notification.
pub trait DiedListener: Send + Sync {
    /// Called at most once per bus.
    fn on_died(&self);
}

impl<F> LineListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_line(&self, line: &str) {
        self(line);
    }
}

impl<F> DiedListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_died(&self) {
        self();
    }
}

/// Forwards both notification kinds into an unbounded channel.
struct ChannelListener(mpsc::UnboundedSender<ProcessEvent>);

impl LineListener for ChannelListener {
    fn on_line(&self, line: &str) {
        if self.0.send(ProcessEvent::Line(line.to_owned())).is_err() {
            debug!("event bus: line receiver dropped");
        }
    }
}

impl DiedListener for ChannelListener {
    fn on_died(&self) {
        if self.0.send(ProcessEvent::Died).is_err() {
            debug!("event bus: died receiver dropped");
        }
    }
}

/// Publish point for `line` and `died` notifications of one process.
#[derive(Default)]
pub struct EventBus {
    line_listeners: RwLock<Vec<Arc<dyn LineListener>>>,
    died_listeners: RwLock<Vec<Arc<dyn DiedListener>>>,
    /// `true` once `died` has been emitted. Held across line delivery so a
    /// concurrent `died` cannot slip in between the check and the callbacks.
    died: Mutex<bool>,
    /// Copy of `died` written under the gate, readable without it.
    died_flag: AtomicBool,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a line listener.
    pub fn on_line(&self, listener: impl LineListener + 'static) {
        self.line_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Register a death listener.
    pub fn on_died(&self, listener: impl DiedListener + 'static) {
        self.died_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Register a channel receiving every future notification of both kinds.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ProcessEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Arc::new(ChannelListener(tx));
        self.line_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&listener) as Arc<dyn LineListener>);
        self.died_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener as Arc<dyn DiedListener>);
        rx
    }

    /// Deliver `line` to every line listener.
    ///
    /// Returns `false` without delivering when `died` was already emitted.
    #[must_use]
    pub fn emit_line(&self, line: &str) -> bool {
        let died = self.died.lock().unwrap_or_else(PoisonError::into_inner);
        if *died {
            return false;
        }

        let listeners = self
            .line_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener.on_line(line);
        }

        drop(died);
        true
    }

    /// Deliver the death notification to every died listener.
    ///
    /// Only the first call delivers; later calls do nothing.
    pub fn emit_died(&self) {
        {
            let mut died = self.died.lock().unwrap_or_else(PoisonError::into_inner);
            if *died {
                debug!("event bus: died already emitted, ignoring");
                return;
            }
            *died = true;
            self.died_flag.store(true, Ordering::Release);
        }

        let listeners = self
            .died_listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener.on_died();
        }
    }

    /// Whether `died` has been emitted.
    ///
    /// Never blocks, so it is safe to call from inside a listener.
    #[must_use]
    pub fn has_died(&self) -> bool {
        self.died_flag.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("died", &self.has_died())
            .finish_non_exhaustive()
    }
}
