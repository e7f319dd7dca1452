//! Typed publish/subscribe events for Horizon Collections.
//!
//! An [`Event<S, A>`] keeps an ordered list of handlers. Raising the event
//! invokes every handler synchronously, in registration order, on the calling
//! thread, passing the sender and a reference to the arguments.
//!
//! # Key Types
//!
//! - [`Event<S, A>`] - The event itself, parameterized by sender and argument types
//! - [`HandlerId`] - Returned when a handler is added, used to remove it
//! - [`ContextId`] - Optional owner tag so a group of handlers can be removed at once
//! - [`EventArgs`] - Empty arguments for events that carry no payload
//! - [`CancelEventArgs`] - Arguments for "changing" events that observers may veto
//!
//! # Re-entrancy
//!
//! The handler list is live while an event is being raised. Handlers are
//! visited by position, so a handler that adds or removes handlers during a
//! raise only affects positions that have not been visited yet. No lock is
//! held while a handler runs, which means handlers may freely call back into
//! the event or into the object raising it.
//!
//! # Example
//!
//! ```
//! use horizon_collections_core::{Event, EventArgs};
//!
//! struct Counter;
//!
//! let changed = Event::<Counter, EventArgs>::new();
//! let id = changed.add_handler(|_sender, _args| {
//!     println!("changed");
//! });
//!
//! changed.raise_default(&Counter);
//! changed.remove_handler(Some(id), None);
//! assert_eq!(changed.handler_count(), 0);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a handler registered on an [`Event`].
    ///
    /// Pass it to [`Event::remove_handler`] to unsubscribe.
    pub struct HandlerId;
}

/// Identifies the owner of a group of handlers.
///
/// Handlers registered with [`Event::add_handler_with_context`] can later be
/// removed together by passing the same context to [`Event::remove_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Context keyed by the address of `owner`.
    ///
    /// Two live owners never share a context. The id may be reused once
    /// `owner` is dropped, so remove its handlers before that.
    pub fn of<T: ?Sized>(owner: &T) -> Self {
        Self(std::ptr::from_ref(owner).cast::<()>() as usize as u64)
    }

    /// Context from a key chosen by the caller.
    pub const fn from_raw(key: u64) -> Self {
        Self(key)
    }
}

/// Arguments for events that carry no payload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventArgs;

/// Arguments for events that observers may cancel.
///
/// The flag uses interior mutability because handlers only receive a shared
/// reference to the arguments.
#[derive(Debug, Default)]
pub struct CancelEventArgs {
    cancel: AtomicBool,
}

impl CancelEventArgs {
    /// Create arguments with the cancel flag cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the pending operation be canceled.
    pub fn cancel(&self) {
        self.set_cancel(true);
    }

    /// Set or clear the cancel flag.
    pub fn set_cancel(&self, cancel: bool) {
        self.cancel.store(cancel, Ordering::SeqCst);
    }

    /// Whether any handler canceled the operation.
    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

type HandlerFn<S, A> = Arc<dyn Fn(&S, &A) + Send + Sync>;

/// Internal storage for a single registration.
struct Handler<S: ?Sized, A> {
    callback: HandlerFn<S, A>,
    context: Option<ContextId>,
}

/// Handlers by id, plus their registration order.
struct Registry<S: ?Sized, A> {
    handlers: SlotMap<HandlerId, Handler<S, A>>,
    order: Vec<HandlerId>,
}

/// A typed event with an ordered list of handlers.
///
/// # Type Parameters
///
/// - `S`: The sender type passed as the first handler argument.
/// - `A`: The argument type passed as the second handler argument.
///
/// # Thread Safety
///
/// `Event<S, A>` is `Send + Sync`. Handlers run on the thread that raises the
/// event.
pub struct Event<S: ?Sized, A = EventArgs> {
    registry: Mutex<Registry<S, A>>,
}

impl<S: ?Sized, A> Default for Event<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized, A> Event<S, A> {
    /// Create an event with no handlers.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                handlers: SlotMap::with_key(),
                order: Vec::new(),
            }),
        }
    }

    /// Append a handler to the end of the handler list.
    pub fn add_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        self.insert(Arc::new(handler), None)
    }

    /// Append a handler tagged with an owner context.
    pub fn add_handler_with_context<F>(&self, handler: F, context: ContextId) -> HandlerId
    where
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        self.insert(Arc::new(handler), Some(context))
    }

    fn insert(&self, callback: HandlerFn<S, A>, context: Option<ContextId>) -> HandlerId {
        let mut registry = self.registry.lock();
        let id = registry.handlers.insert(Handler { callback, context });
        registry.order.push(id);
        id
    }

    /// Remove matching registrations.
    ///
    /// `None` acts as a wildcard for either argument: `(Some(id), None)`
    /// removes one handler, `(None, Some(ctx))` removes every handler owned
    /// by `ctx`, and `(None, None)` removes everything.
    ///
    /// Returns the number of handlers removed.
    pub fn remove_handler(&self, handler: Option<HandlerId>, context: Option<ContextId>) -> usize {
        let mut registry = self.registry.lock();
        let Registry { handlers, order } = &mut *registry;
        let before = order.len();
        order.retain(|id| {
            let Some(entry) = handlers.get(*id) else {
                return false;
            };
            let id_matches = handler.is_none_or(|h| h == *id);
            let context_matches = context.is_none_or(|c| entry.context == Some(c));
            if id_matches && context_matches {
                handlers.remove(*id);
                false
            } else {
                true
            }
        });
        before - order.len()
    }

    /// Remove every handler.
    pub fn remove_all_handlers(&self) {
        let mut registry = self.registry.lock();
        registry.handlers.clear();
        registry.order.clear();
    }

    /// Whether at least one handler is registered.
    pub fn has_handlers(&self) -> bool {
        !self.registry.lock().order.is_empty()
    }

    /// Get the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.registry.lock().order.len()
    }

    /// Invoke every handler in registration order.
    ///
    /// The registry lock is released before each handler is called.
    #[tracing::instrument(skip_all, target = "horizon_collections_core::event", level = "trace")]
    pub fn raise(&self, sender: &S, args: &A) {
        let mut position = 0;
        loop {
            let callback = {
                let registry = self.registry.lock();
                let Some(id) = registry.order.get(position) else {
                    break;
                };
                registry
                    .handlers
                    .get(*id)
                    .map(|entry| Arc::clone(&entry.callback))
            };
            if let Some(callback) = callback {
                callback(sender, args);
            }
            position += 1;
        }
        tracing::trace!(target: targets::EVENT, visited = position, "event raised");
    }
}

impl<S: ?Sized, A: Default> Event<S, A> {
    /// Raise the event with default arguments.
    pub fn raise_default(&self, sender: &S) {
        self.raise(sender, &A::default());
    }
}

static_assertions::assert_impl_all!(Event<str, EventArgs>: Send, Sync);
static_assertions::assert_impl_all!(CancelEventArgs: Send, Sync);
