//! Raw input event hook
//!
//! `InputHook` is the seam between the OS event stream and its consumers.
//! Handlers run inline on the hook thread, in delivery order. A handler
//! returning `HookFlow::Stop` is detached before the next event is delivered.
//!
//! The rdev backend can only install one OS listener per process, so a
//! single `input-hook` thread fans events out to every attached handler.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::keys::KeyIdentifier;
use super::listener::HotkeyError;
use super::tracker::KeyEvent;

/// How long to wait for the OS listener to fail before assuming it attached
const ATTACH_GRACE: Duration = Duration::from_millis(250);

/// Events delivered to hook handlers
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Pointer moved to screen coordinates
    PointerMoved { x: f64, y: f64 },
}

impl InputEvent {
    /// Convert an rdev event; events we do not track yield `None`
    pub fn from_rdev(event: &rdev::Event) -> Option<Self> {
        match event.event_type {
            rdev::EventType::KeyPress(key) => {
                Some(InputEvent::Key(KeyEvent::pressed(KeyIdentifier::from(key))))
            }
            rdev::EventType::KeyRelease(key) => {
                Some(InputEvent::Key(KeyEvent::released(KeyIdentifier::from(key))))
            }
            rdev::EventType::MouseMove { x, y } => Some(InputEvent::PointerMoved { x, y }),
            _ => None,
        }
    }
}

/// Whether a handler wants further events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    Stop,
}

pub type EventHandler = Box<dyn FnMut(&InputEvent) -> HookFlow + Send>;

/// A source of raw OS input events
pub trait InputHook: Send + Sync {
    /// Attach a handler; it receives events until it returns `Stop` or the
    /// returned handle is detached.
    fn attach(&self, handler: EventHandler) -> Result<HookHandle, HotkeyError>;

    /// Whether the underlying OS hook is still delivering events
    fn is_alive(&self) -> bool;
}

/// Attached handlers, shared between a hook and its handles
#[derive(Default)]
pub struct HookRegistry {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, EventHandler)>>,
}

impl HookRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a handler and return its handle
    pub fn register(self: &Arc<Self>, handler: EventHandler) -> HookHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, handler));
        debug!(id, "hook handler attached");
        HookHandle {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Deliver one event to every handler, in attach order
    ///
    /// Never unwinds: a panicking handler is logged and detached.
    pub fn deliver(&self, event: &InputEvent) {
        let mut handlers = self.lock();
        handlers.retain_mut(|(id, handler)| {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(HookFlow::Continue) => true,
                Ok(HookFlow::Stop) => {
                    debug!(id = *id, "hook handler stopped");
                    false
                }
                Err(_) => {
                    error!(id = *id, "hook handler panicked, detaching");
                    false
                }
            }
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn contains(&self, id: u64) -> bool {
        self.lock().iter().any(|(handler_id, _)| *handler_id == id)
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|(handler_id, _)| *handler_id != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, EventHandler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Detaches its handler when dropped
pub struct HookHandle {
    id: u64,
    registry: Weak<HookRegistry>,
}

impl HookHandle {
    /// Whether the handler still receives events
    pub fn is_attached(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.contains(self.id))
            .unwrap_or(false)
    }

    /// Detach the handler now
    ///
    /// Blocks while an event is being delivered, so an in-flight handler
    /// call always completes first.
    pub fn detach(self) {
        drop(self);
    }
}

impl Drop for HookHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            debug!(id = self.id, "hook handler detached");
        }
    }
}

impl std::fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookHandle").field("id", &self.id).finish()
    }
}

/// Input hook backed by `rdev::listen`
pub struct RdevHook {
    registry: Arc<HookRegistry>,
    alive: Arc<AtomicBool>,
    started: OnceLock<Result<(), String>>,
}

impl RdevHook {
    /// The process-wide hook (rdev supports one OS listener per process)
    pub fn global() -> Arc<RdevHook> {
        static HOOK: OnceLock<Arc<RdevHook>> = OnceLock::new();
        Arc::clone(HOOK.get_or_init(|| {
            Arc::new(RdevHook {
                registry: HookRegistry::new(),
                alive: Arc::new(AtomicBool::new(false)),
                started: OnceLock::new(),
            })
        }))
    }

    fn ensure_started(&self) -> Result<(), HotkeyError> {
        self.started
            .get_or_init(|| spawn_listen_thread(Arc::clone(&self.registry), Arc::clone(&self.alive)))
            .clone()
            .map_err(HotkeyError::Hook)
    }
}

impl InputHook for RdevHook {
    fn attach(&self, handler: EventHandler) -> Result<HookHandle, HotkeyError> {
        self.ensure_started()?;
        if !self.is_alive() {
            return Err(HotkeyError::Hook("input hook thread has exited".to_string()));
        }
        Ok(self.registry.register(handler))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Start the OS listener thread and wait briefly for an attach failure
fn spawn_listen_thread(registry: Arc<HookRegistry>, alive: Arc<AtomicBool>) -> Result<(), String> {
    let (failure_tx, failure_rx) = mpsc::channel::<String>();
    alive.store(true, Ordering::SeqCst);

    let thread_alive = Arc::clone(&alive);
    thread::Builder::new()
        .name("input-hook".to_string())
        .spawn(move || {
            info!("input hook thread started");

            let result = rdev::listen(move |event| {
                if let Some(input) = InputEvent::from_rdev(&event) {
                    registry.deliver(&input);
                }
            });

            thread_alive.store(false, Ordering::SeqCst);
            match result {
                Ok(()) => warn!("input hook returned without error"),
                Err(e) => {
                    error!(?e, "input hook failed");
                    let _ = failure_tx.send(format!("{:?}", e));
                }
            }
        })
        .map_err(|e| {
            alive.store(false, Ordering::SeqCst);
            format!("failed to spawn input hook thread: {e}")
        })?;

    match failure_rx.recv_timeout(ATTACH_GRACE) {
        Ok(reason) => Err(reason),
        Err(RecvTimeoutError::Timeout) => {
            info!("input hook attached");
            Ok(())
        }
        Err(RecvTimeoutError::Disconnected) => Err("input hook thread exited".to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process hook for tests: events are pushed by the test itself

    use super::*;

    pub struct ManualHook {
        registry: Arc<HookRegistry>,
        pub fail_attach: AtomicBool,
    }

    impl ManualHook {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                registry: HookRegistry::new(),
                fail_attach: AtomicBool::new(false),
            })
        }

        pub fn push(&self, event: InputEvent) {
            self.registry.deliver(&event);
        }

        pub fn press(&self, raw: &str) {
            self.push(InputEvent::Key(KeyEvent::pressed(KeyIdentifier::new(raw))));
        }

        pub fn release(&self, raw: &str) {
            self.push(InputEvent::Key(KeyEvent::released(KeyIdentifier::new(raw))));
        }

        pub fn handler_count(&self) -> usize {
            self.registry.len()
        }
    }

    impl InputHook for ManualHook {
        fn attach(&self, handler: EventHandler) -> Result<HookHandle, HotkeyError> {
            if self.fail_attach.load(Ordering::SeqCst) {
                return Err(HotkeyError::Hook("no display".to_string()));
            }
            Ok(self.registry.register(handler))
        }

        fn is_alive(&self) -> bool {
            !self.fail_attach.load(Ordering::SeqCst)
        }
    }
}
