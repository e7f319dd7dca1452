//! Observable sequences.
//!
//! [`ObservableArray<T>`] wraps a `Vec<T>` and raises a
//! `collection_changed` event for every mutation made through its methods.
//!
//! # Notifications
//!
//! | Operation | Notification |
//! |-----------|--------------|
//! | [`push`](ObservableArray::push) | `Add` at the new last index (once per item for [`extend`](ObservableArray::extend)) |
//! | [`pop`](ObservableArray::pop) | `Remove` at the old last index |
//! | [`splice`](ObservableArray::splice) replacing one item | `Change` |
//! | [`splice`](ObservableArray::splice) inserting one item | `Add` |
//! | [`splice`](ObservableArray::splice) deleting one item | `Remove` |
//! | any other splice | `Reset` |
//! | [`sort_by`](ObservableArray::sort_by) | `Reset` |
//!
//! `insert`, `remove`, `remove_at`, `set_at` and `clear` are all expressed
//! through `splice`.
//!
//! # Batching
//!
//! [`begin_update`](ObservableArray::begin_update) and
//! [`end_update`](ObservableArray::end_update) nest. While at least one
//! update is open no notification is raised; closing the outermost one raises
//! a single `Reset`.
//!
//! # Silent writes
//!
//! [`write_silently`](ObservableArray::write_silently) mutates the vector
//! without raising anything. It is the only non-notifying write path and
//! observers are not told about changes made through it.

use std::sync::Arc;

use horizon_collections_core::logging::targets;
use horizon_collections_core::Event;
use parking_lot::{Mutex, RwLock};

/// The kind of change described by [`CollectionChangedEventArgs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionChangedAction {
    /// An item was added.
    Add,
    /// An item was removed.
    Remove,
    /// An item was replaced or modified in place.
    Change,
    /// Anything may have changed; observers should reload everything.
    Reset,
}

/// Arguments for `collection_changed` events.
#[derive(Debug, Clone)]
pub struct CollectionChangedEventArgs<T> {
    /// What happened.
    pub action: CollectionChangedAction,
    /// The affected item, for `Add`, `Remove` and `Change`.
    pub item: Option<T>,
    /// The index of the affected item, for `Add`, `Remove` and `Change`.
    pub index: Option<usize>,
}

impl<T> CollectionChangedEventArgs<T> {
    /// Arguments describing a change to a single item.
    pub fn new(action: CollectionChangedAction, item: T, index: usize) -> Self {
        Self {
            action,
            item: Some(item),
            index: Some(index),
        }
    }

    /// Arguments describing a full reset.
    pub fn reset() -> Self {
        Self {
            action: CollectionChangedAction::Reset,
            item: None,
            index: None,
        }
    }

    /// Whether this is a reset notification.
    pub fn is_reset(&self) -> bool {
        self.action == CollectionChangedAction::Reset
    }
}

impl<T> Default for CollectionChangedEventArgs<T> {
    fn default() -> Self {
        Self::reset()
    }
}

/// Identity comparison for items stored in observable collections.
///
/// Shared items compare by pointer; plain values compare by equality.
pub trait ItemIdentity {
    /// Whether `self` and `other` are the same item.
    fn is_same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> ItemIdentity for Arc<T> {
    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

macro_rules! impl_item_identity_by_eq {
    ($($ty:ty),*) => {
        $(
            impl ItemIdentity for $ty {
                fn is_same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_item_identity_by_eq!(
    bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, String,
    &'static str, crate::Value
);

/// The event type raised by an [`ObservableArray`].
pub type CollectionChangedEvent<T> = Event<ObservableArray<T>, CollectionChangedEventArgs<T>>;

/// A vector that raises change notifications.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use horizon_collections::{CollectionChangedAction, ObservableArray};
///
/// let array = ObservableArray::from_vec(vec![1, 2, 3]);
/// let actions = Arc::new(Mutex::new(Vec::new()));
///
/// let actions_clone = actions.clone();
/// array.collection_changed().add_handler(move |_, args| {
///     actions_clone.lock().push(args.action);
/// });
///
/// array.push(4);
/// array.remove_at(0);
/// assert_eq!(
///     *actions.lock(),
///     vec![CollectionChangedAction::Add, CollectionChangedAction::Remove]
/// );
/// ```
pub struct ObservableArray<T> {
    items: RwLock<Vec<T>>,
    update_depth: Mutex<usize>,
    collection_changed: CollectionChangedEvent<T>,
}

impl<T: Clone + Send + Sync + 'static> Default for ObservableArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableArray<T> {
    /// Create an empty array.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create an array holding `items`. No notification is raised.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            update_depth: Mutex::new(0),
            collection_changed: Event::new(),
        }
    }

    /// The event raised after each notifying mutation.
    pub fn collection_changed(&self) -> &CollectionChangedEvent<T> {
        &self.collection_changed
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Get a clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// Get a clone of every item.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Run `f` with read access to the items.
    ///
    /// The array must not be mutated from inside `f`.
    pub fn with_items<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&[T]) -> Ret,
    {
        f(&self.items.read())
    }

    /// Append an item. Raises `Add`. Returns the new length.
    pub fn push(&self, item: T) -> usize {
        let index = {
            let mut items = self.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.raise_collection_changed(CollectionChangedEventArgs::new(
            CollectionChangedAction::Add,
            item,
            index,
        ));
        index + 1
    }

    /// Append several items, raising `Add` once per item.
    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) -> usize {
        let mut len = self.len();
        for item in items {
            len = self.push(item);
        }
        len
    }

    /// Remove and return the last item. Raises `Remove`.
    pub fn pop(&self) -> Option<T> {
        let (item, index) = {
            let mut items = self.items.write();
            let item = items.pop()?;
            let index = items.len();
            (item, index)
        };
        self.raise_collection_changed(CollectionChangedEventArgs::new(
            CollectionChangedAction::Remove,
            item.clone(),
            index,
        ));
        Some(item)
    }

    /// Remove `count` items at `index`, optionally inserting `item` there.
    ///
    /// `index` and `count` are clamped to the array bounds. Returns the
    /// removed items.
    pub fn splice(&self, index: usize, count: usize, item: Option<T>) -> Vec<T> {
        let (removed, index) = {
            let mut items = self.items.write();
            let index = index.min(items.len());
            let count = count.min(items.len() - index);
            let removed: Vec<T> = items
                .splice(index..index + count, item.iter().cloned())
                .collect();
            (removed, index)
        };

        let args = match (item, removed.len()) {
            (Some(item), 1) => {
                CollectionChangedEventArgs::new(CollectionChangedAction::Change, item, index)
            }
            (Some(item), 0) => {
                CollectionChangedEventArgs::new(CollectionChangedAction::Add, item, index)
            }
            (None, 1) => CollectionChangedEventArgs::new(
                CollectionChangedAction::Remove,
                removed[0].clone(),
                index,
            ),
            _ => CollectionChangedEventArgs::reset(),
        };
        self.raise_collection_changed(args);
        removed
    }

    /// Insert an item at `index`. Raises `Add`.
    pub fn insert(&self, index: usize, item: T) {
        self.splice(index, 0, Some(item));
    }

    /// Remove the item at `index`. Raises `Remove`.
    pub fn remove_at(&self, index: usize) -> Option<T> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, None).into_iter().next()
    }

    /// Replace the item at `index`. Raises `Change`. Returns the old item.
    pub fn set_at(&self, index: usize, item: T) -> Option<T> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, Some(item)).into_iter().next()
    }

    /// Remove every item.
    ///
    /// Raises `Remove` when exactly one item was present, `Reset` otherwise.
    pub fn clear(&self) {
        let len = self.len();
        self.splice(0, len, None);
    }

    /// Sort the items with a comparator. Always raises `Reset`.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.items.write().sort_by(compare);
        self.raise_collection_changed(CollectionChangedEventArgs::reset());
    }

    /// Sort the items by their natural order. Always raises `Reset`.
    pub fn sort(&self)
    where
        T: Ord,
    {
        self.sort_by(Ord::cmp);
    }

    /// Raise `Change` for the item at `index` without modifying it.
    ///
    /// Used when an item was modified in place. Returns `false` if the
    /// index is out of range.
    pub fn notify_changed(&self, index: usize) -> bool {
        let Some(item) = self.get(index) else {
            return false;
        };
        self.raise_collection_changed(CollectionChangedEventArgs::new(
            CollectionChangedAction::Change,
            item,
            index,
        ));
        true
    }

    /// Mutate the items without raising any notification.
    pub fn write_silently<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&mut Vec<T>) -> Ret,
    {
        f(&mut self.items.write())
    }

    /// Suspend notifications until the matching [`end_update`](Self::end_update).
    pub fn begin_update(&self) {
        *self.update_depth.lock() += 1;
    }

    /// Close an update opened by [`begin_update`](Self::begin_update).
    ///
    /// Closing the outermost update raises a single `Reset`. An unmatched
    /// call does nothing.
    pub fn end_update(&self) {
        let depth = {
            let mut depth = self.update_depth.lock();
            if *depth == 0 {
                tracing::debug!(target: targets::OBSERVABLE, "end_update without a matching begin_update");
                return;
            }
            *depth -= 1;
            *depth
        };
        if depth == 0 {
            self.raise_collection_changed(CollectionChangedEventArgs::reset());
        }
    }

    /// Whether an update is open.
    pub fn is_updating(&self) -> bool {
        *self.update_depth.lock() > 0
    }

    /// Run `f` inside a `begin_update`/`end_update` pair.
    ///
    /// The update is closed even if `f` panics.
    pub fn defer_update<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce() -> Ret,
    {
        self.begin_update();
        let _guard = DeferredUpdate { array: self };
        f()
    }

    /// Raise `collection_changed` unless an update is open.
    pub fn raise_collection_changed(&self, args: CollectionChangedEventArgs<T>) {
        if self.is_updating() {
            tracing::trace!(target: targets::OBSERVABLE, "update open, notification suppressed");
            return;
        }
        self.collection_changed.raise(self, &args);
    }
}

impl<T: Clone + Send + Sync + ItemIdentity + 'static> ObservableArray<T> {
    /// Index of `item`, by identity.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.read().iter().position(|i| i.is_same(item))
    }

    /// Whether `item` is present, by identity.
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Remove `item`. Raises `Remove`. Returns whether it was present.
    pub fn remove(&self, item: &T) -> bool {
        match self.index_of(item) {
            Some(index) => {
                self.splice(index, 1, None);
                true
            }
            None => false,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> FromIterator<T> for ObservableArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for ObservableArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableArray")
            .field("items", &*self.items.read())
            .field("update_depth", &*self.update_depth.lock())
            .finish()
    }
}

struct DeferredUpdate<'a, T: Clone + Send + Sync + 'static> {
    array: &'a ObservableArray<T>,
}

impl<T: Clone + Send + Sync + 'static> Drop for DeferredUpdate<'_, T> {
    fn drop(&mut self) {
        self.array.end_update();
    }
}

static_assertions::assert_impl_all!(ObservableArray<i32>: Send, Sync);
