//! The collection view: a filtered, sorted, grouped and paged projection
//! of an observable source collection.
//!
//! A [`CollectionView`] never copies records. It holds shared handles to the
//! source items and rebuilds its projection whenever the source, the
//! filter, or the sort/group descriptions change. Consumers observe it
//! through [`CollectionView::collection_changed`] and the cursor and paging
//! events.
//!
//! # Refresh pipeline
//!
//! A refresh runs these steps in order:
//!
//! 1. Filter the source items (when filtering is enabled).
//! 2. Sort by the sort descriptions.
//! 3. Group by the group descriptions and flatten in group order.
//! 4. Slice out the current page and regroup it.
//! 5. Re-anchor the cursor on the previously current item.
//!
//! # Lock discipline
//!
//! No view lock is held while an event is raised or a user callback runs,
//! so handlers may call back into the view freely. Callbacks that receive
//! an item see it through the item's shared read lock.

use std::sync::{Arc, Weak};

use horizon_collections_core::logging::{span_names, targets};
use horizon_collections_core::{CancelEventArgs, Event, EventArgs, HandlerId, PerfSpan};
use parking_lot::{Mutex, RwLock};

use crate::aggregate::{get_aggregate, Aggregate};
use crate::collection::builder::{CollectionViewBuilder, CollectionViewCapabilities, NewItemFn, ViewSettings};
use crate::collection::group::{build_groups, groups_digest, CollectionViewGroup, SharedGroupDescription};
use crate::collection::sort::{sort_items, SortComparerFn, SortConverterFn, SortDescription, SortHooks};
use crate::error::{CollectionError, Result};
use crate::observable::{CollectionChangedAction, CollectionChangedEventArgs, ObservableArray};
use crate::record::{shared, Record, RecordSnapshot, SharedItem};
use crate::value::Value;

/// The source collection type of a view.
pub type SourceCollection<R> = ObservableArray<SharedItem<R>>;

/// Event raised when the view's items change.
pub type ViewChangedEvent<R> = Event<CollectionView<R>, CollectionChangedEventArgs<SharedItem<R>>>;

/// Arguments for the cancelable `page_changing` event.
#[derive(Debug)]
pub struct PageChangingEventArgs {
    new_page_index: usize,
    cancel: CancelEventArgs,
}

impl PageChangingEventArgs {
    /// Arguments for a move to `new_page_index`.
    pub fn new(new_page_index: usize) -> Self {
        Self {
            new_page_index,
            cancel: CancelEventArgs::new(),
        }
    }

    /// The page the view is about to move to.
    pub fn new_page_index(&self) -> usize {
        self.new_page_index
    }

    /// Veto the page change.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether a handler vetoed the page change.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}

/// The projection produced by the last refresh, plus the cursor and the
/// pending transactions.
struct ViewState<R: Record> {
    /// Every visible item, across pages.
    view: Vec<SharedItem<R>>,
    /// Items of the current page.
    page_view: Vec<SharedItem<R>>,
    groups: Vec<Arc<CollectionViewGroup<R>>>,
    full_groups: Vec<Arc<CollectionViewGroup<R>>>,
    digest: String,
    current: Option<usize>,
    page_index: usize,
    new_item: Option<SharedItem<R>>,
    edit_item: Option<SharedItem<R>>,
    edit_snapshot: Option<RecordSnapshot>,
}

impl<R: Record> Default for ViewState<R> {
    fn default() -> Self {
        Self {
            view: Vec::new(),
            page_view: Vec::new(),
            groups: Vec::new(),
            full_groups: Vec::new(),
            digest: String::new(),
            current: None,
            page_index: 0,
            new_item: None,
            edit_item: None,
            edit_snapshot: None,
        }
    }
}

/// Generates a getter/setter pair for one capability flag.
macro_rules! capability {
    ($(#[$meta:meta])* $flag:ident, $setter:ident, refresh: $refresh:expr) => {
        $(#[$meta])*
        pub fn $flag(&self) -> bool {
            self.settings.read().capabilities.$flag
        }

        #[doc = concat!("Set `", stringify!($flag), "`.")]
        pub fn $setter(&self, value: bool) {
            let changed = {
                let mut settings = self.settings.write();
                let changed = settings.capabilities.$flag != value;
                settings.capabilities.$flag = value;
                changed
            };
            if changed && $refresh {
                self.refresh();
            }
        }
    };
}

/// A shaped view over an observable collection of shared records.
///
/// Views are always handled through an `Arc`; the view subscribes to its
/// source and its description lists with weak references to itself.
///
/// # Example
///
/// ```
/// use horizon_collections::{CollectionView, DataRecord, SortDescription, Value};
///
/// let view = CollectionView::from_items(vec![
///     DataRecord::new().with("city", "Seattle").with("sales", 10),
///     DataRecord::new().with("city", "Boston").with("sales", 25),
///     DataRecord::new().with("city", "Albany").with("sales", 5),
/// ]);
///
/// view.sort_descriptions().push(SortDescription::descending("sales"));
///
/// let cities: Vec<Value> = view
///     .items()
///     .iter()
///     .map(|item| item.read().get("city").cloned().unwrap_or_default())
///     .collect();
/// assert_eq!(cities, vec!["Boston".into(), "Seattle".into(), "Albany".into()]);
/// ```
pub struct CollectionView<R: Record> {
    this: Weak<CollectionView<R>>,
    source: RwLock<Option<Arc<SourceCollection<R>>>>,
    source_handler: Mutex<Option<HandlerId>>,
    sort_descriptions: ObservableArray<SortDescription>,
    group_descriptions: ObservableArray<SharedGroupDescription<R>>,
    settings: RwLock<ViewSettings<R>>,
    state: RwLock<ViewState<R>>,
    update_depth: Mutex<usize>,
    items_added: ObservableArray<SharedItem<R>>,
    items_removed: ObservableArray<SharedItem<R>>,
    items_edited: ObservableArray<SharedItem<R>>,
    collection_changed: ViewChangedEvent<R>,
    current_changing: Event<CollectionView<R>, CancelEventArgs>,
    current_changed: Event<CollectionView<R>, EventArgs>,
    source_collection_changing: Event<CollectionView<R>, CancelEventArgs>,
    source_collection_changed: Event<CollectionView<R>, EventArgs>,
    page_changing: Event<CollectionView<R>, PageChangingEventArgs>,
    page_changed: Event<CollectionView<R>, EventArgs>,
}

impl<R: Record> CollectionView<R> {
    /// Creates a view over `source` with default settings.
    pub fn new(source: Arc<SourceCollection<R>>) -> Arc<Self> {
        CollectionViewBuilder::new().source(source).build()
    }

    /// Creates a view over a new, empty source collection.
    pub fn empty() -> Arc<Self> {
        CollectionViewBuilder::new().build()
    }

    /// Creates a view over a new source collection holding `items`.
    pub fn from_items<I>(items: I) -> Arc<Self>
    where
        I: IntoIterator<Item = R>,
    {
        CollectionViewBuilder::new().items(items).build()
    }

    /// Starts a [`CollectionViewBuilder`].
    pub fn builder() -> CollectionViewBuilder<R> {
        CollectionViewBuilder::new()
    }

    pub(crate) fn with_settings(
        settings: ViewSettings<R>,
        sort_descriptions: Vec<SortDescription>,
        group_descriptions: Vec<SharedGroupDescription<R>>,
        source: Option<Arc<SourceCollection<R>>>,
    ) -> Arc<Self> {
        let view = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            source: RwLock::new(None),
            source_handler: Mutex::new(None),
            sort_descriptions: ObservableArray::from_vec(sort_descriptions),
            group_descriptions: ObservableArray::from_vec(group_descriptions),
            settings: RwLock::new(settings),
            state: RwLock::new(ViewState::default()),
            update_depth: Mutex::new(0),
            items_added: ObservableArray::new(),
            items_removed: ObservableArray::new(),
            items_edited: ObservableArray::new(),
            collection_changed: Event::new(),
            current_changing: Event::new(),
            current_changed: Event::new(),
            source_collection_changing: Event::new(),
            source_collection_changed: Event::new(),
            page_changing: Event::new(),
            page_changed: Event::new(),
        });
        view.observe_descriptions();
        view.set_source_collection(source);
        view
    }

    fn observe_descriptions(&self) {
        let this = self.this.clone();
        self.sort_descriptions.collection_changed().add_handler(move |_, _| {
            if let Some(view) = this.upgrade() {
                view.refresh();
            }
        });
        let this = self.this.clone();
        self.group_descriptions.collection_changed().add_handler(move |_, _| {
            if let Some(view) = this.upgrade() {
                view.refresh();
            }
        });
    }

    // Events

    /// Raised after the view's items change.
    ///
    /// Single-item changes carry the item and its index in the current page;
    /// anything structural is reported as a reset.
    pub fn collection_changed(&self) -> &ViewChangedEvent<R> {
        &self.collection_changed
    }

    /// Raised before the cursor moves. Cancel the arguments to veto.
    pub fn current_changing(&self) -> &Event<CollectionView<R>, CancelEventArgs> {
        &self.current_changing
    }

    /// Raised after the cursor moves.
    pub fn current_changed(&self) -> &Event<CollectionView<R>, EventArgs> {
        &self.current_changed
    }

    /// Raised before the source collection is replaced. Cancel to veto.
    pub fn source_collection_changing(&self) -> &Event<CollectionView<R>, CancelEventArgs> {
        &self.source_collection_changing
    }

    /// Raised after the source collection is replaced.
    pub fn source_collection_changed(&self) -> &Event<CollectionView<R>, EventArgs> {
        &self.source_collection_changed
    }

    /// Raised before the page changes. Cancel to veto.
    pub fn page_changing(&self) -> &Event<CollectionView<R>, PageChangingEventArgs> {
        &self.page_changing
    }

    /// Raised after the page changes.
    pub fn page_changed(&self) -> &Event<CollectionView<R>, EventArgs> {
        &self.page_changed
    }

    // Source collection

    /// The source collection, if one is attached.
    pub fn source_collection(&self) -> Option<Arc<SourceCollection<R>>> {
        self.source.read().clone()
    }

    /// Replace the source collection.
    ///
    /// Pending transactions are discarded, the change ledgers are cleared,
    /// the view is rebuilt and the cursor moves to the first item. Returns
    /// false if a `source_collection_changing` handler vetoed the change.
    pub fn set_source_collection(&self, source: Option<Arc<SourceCollection<R>>>) -> bool {
        let args = CancelEventArgs::new();
        self.source_collection_changing.raise(self, &args);
        if args.is_canceled() {
            tracing::debug!(target: targets::COLLECTION_VIEW, "source collection change canceled");
            return false;
        }

        self.detach_source();
        if let Some(source) = &source {
            let this = self.this.clone();
            let handler = source.collection_changed().add_handler(move |_, _| {
                if let Some(view) = this.upgrade() {
                    view.on_source_changed();
                }
            });
            *self.source_handler.lock() = Some(handler);
        }
        tracing::debug!(
            target: targets::COLLECTION_VIEW,
            items = source.as_ref().map_or(0, |s| s.len()),
            "source collection replaced"
        );
        *self.source.write() = source;
        {
            let mut state = self.state.write();
            state.new_item = None;
            state.edit_item = None;
            state.edit_snapshot = None;
            state.current = None;
            state.page_index = 0;
        }

        self.clear_changes();
        self.refresh();
        self.move_current_to_first();
        self.source_collection_changed.raise_default(self);
        true
    }

    fn detach_source(&self) {
        let handler = self.source_handler.lock().take();
        let source = self.source.read().clone();
        if let (Some(handler), Some(source)) = (handler, source) {
            source.collection_changed().remove_handler(Some(handler), None);
        }
    }

    fn on_source_changed(&self) {
        if !self.is_updating() {
            self.refresh();
        }
    }

    // Configuration

    /// All capability flags.
    pub fn capabilities(&self) -> CollectionViewCapabilities {
        self.settings.read().capabilities
    }

    /// Replace all capability flags at once.
    pub fn set_capabilities(&self, capabilities: CollectionViewCapabilities) {
        let reshape = {
            let mut settings = self.settings.write();
            let old = std::mem::replace(&mut settings.capabilities, capabilities);
            old.can_filter != capabilities.can_filter
                || old.can_group != capabilities.can_group
                || old.can_sort != capabilities.can_sort
        };
        if reshape {
            self.refresh();
        }
    }

    capability!(
        /// Whether the filter is applied.
        can_filter, set_can_filter, refresh: true
    );
    capability!(
        /// Whether the group descriptions are applied.
        can_group, set_can_group, refresh: true
    );
    capability!(
        /// Whether the sort descriptions are applied.
        can_sort, set_can_sort, refresh: true
    );
    capability!(
        /// Whether `add_new` is allowed.
        can_add_new, set_can_add_new, refresh: false
    );
    capability!(
        /// Whether `cancel_edit` is allowed.
        can_cancel_edit, set_can_cancel_edit, refresh: false
    );
    capability!(
        /// Whether items may be removed.
        can_remove, set_can_remove, refresh: false
    );
    capability!(
        /// Whether the page may change.
        can_change_page, set_can_change_page, refresh: false
    );

    /// Set the filter predicate and refresh.
    pub fn set_filter<F>(&self, filter: F)
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.settings.write().filter = Some(Arc::new(filter));
        self.refresh();
    }

    /// Clear the filter, showing every source item.
    pub fn clear_filter(&self) {
        self.settings.write().filter = None;
        self.refresh();
    }

    /// Whether a filter predicate is set.
    pub fn has_filter(&self) -> bool {
        self.settings.read().filter.is_some()
    }

    /// Sort keys applied in order. Mutating the list refreshes the view.
    pub fn sort_descriptions(&self) -> &ObservableArray<SortDescription> {
        &self.sort_descriptions
    }

    /// Grouping levels, outermost first. Mutating the list refreshes the view.
    pub fn group_descriptions(&self) -> &ObservableArray<SharedGroupDescription<R>> {
        &self.group_descriptions
    }

    /// Whether ties keep their source order.
    pub fn use_stable_sort(&self) -> bool {
        self.settings.read().stable_sort
    }

    /// Keep items with equal sort keys in source order.
    pub fn set_use_stable_sort(&self, stable: bool) {
        self.settings.write().stable_sort = stable;
        self.refresh();
    }

    /// Set the hook that maps sort keys before comparison, and refresh.
    pub fn set_sort_converter(&self, converter: Option<SortConverterFn<R>>) {
        self.settings.write().sort_converter = converter;
        self.refresh();
    }

    /// Set the comparer used instead of the default value ordering, and refresh.
    pub fn set_sort_comparer(&self, comparer: Option<SortComparerFn>) {
        self.settings.write().sort_comparer = comparer;
        self.refresh();
    }

    /// Factory used by `add_new` instead of `R::default()`.
    pub fn set_new_item_creator(&self, creator: Option<NewItemFn<R>>) {
        self.settings.write().new_item_creator = creator;
    }

    // Update batching

    /// Suspend refreshes until the matching [`end_update`](Self::end_update).
    pub fn begin_update(&self) {
        *self.update_depth.lock() += 1;
    }

    /// Close an update scope; the outermost one refreshes the view. An
    /// unmatched call does nothing.
    pub fn end_update(&self) {
        let depth = {
            let mut depth = self.update_depth.lock();
            if *depth == 0 {
                tracing::debug!(target: targets::COLLECTION_VIEW, "end_update without a matching begin_update");
                return;
            }
            *depth -= 1;
            *depth
        };
        if depth == 0 {
            self.refresh();
        }
    }

    /// Whether an update scope is open.
    pub fn is_updating(&self) -> bool {
        *self.update_depth.lock() > 0
    }

    /// Run `f` inside an update scope that closes even if `f` panics.
    pub fn defer_update<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce() -> Ret,
    {
        self.begin_update();
        let _scope = UpdateScope {
            view: self,
            refresh: true,
        };
        f()
    }

    /// Run `f` with refreshes suspended, without refreshing afterwards.
    fn suppress_refresh<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce() -> Ret,
    {
        self.begin_update();
        let _scope = UpdateScope {
            view: self,
            refresh: false,
        };
        f()
    }

    // Refresh

    /// Rebuild the view from the source and raise a reset.
    ///
    /// Does nothing while an update scope is open or an add/edit
    /// transaction is pending.
    #[tracing::instrument(skip_all, target = "horizon_collections::collection_view", level = "trace")]
    pub fn refresh(&self) {
        if self.is_updating() || self.is_adding_new() || self.is_editing_item() {
            tracing::trace!(target: targets::COLLECTION_VIEW, "refresh deferred");
            return;
        }
        self.perform_refresh(false);
        self.raise_collection_changed(CollectionChangedEventArgs::reset(), false);
    }

    fn perform_refresh(&self, reset_current: bool) {
        let _perf = PerfSpan::new(span_names::REFRESH);
        let previous = self.current_item();

        let source_items = self.source_collection().map(|s| s.to_vec()).unwrap_or_default();
        let (filter, capabilities, page_size, stable, converter, comparer) = {
            let settings = self.settings.read();
            (
                settings.filter.clone(),
                settings.capabilities,
                settings.page_size,
                settings.stable_sort,
                settings.sort_converter.clone(),
                settings.sort_comparer.clone(),
            )
        };

        let mut view = match filter.filter(|_| capabilities.can_filter) {
            Some(predicate) => source_items
                .into_iter()
                .filter(|item| predicate(&*item.read_recursive()))
                .collect(),
            None => source_items,
        };

        if capabilities.can_sort {
            let descriptions = self.sort_descriptions.to_vec();
            if !descriptions.is_empty() {
                let hooks = SortHooks {
                    converter: converter.as_ref(),
                    comparer: comparer.as_ref(),
                };
                sort_items(&mut view, &descriptions, &hooks, stable);
            }
        }

        let group_descriptions = if capabilities.can_group {
            self.group_descriptions.to_vec()
        } else {
            Vec::new()
        };
        let mut full_groups = Vec::new();
        if !group_descriptions.is_empty() {
            let (groups, flattened) = build_groups(&view, &group_descriptions);
            full_groups = groups;
            view = flattened;
        }

        let page_count = page_count_for(view.len(), page_size);
        let page_index = self.state.read().page_index.min(page_count - 1);
        let mut page_view = page_slice(&view, page_index, page_size);
        let groups = if !group_descriptions.is_empty() && page_count > 1 {
            let (groups, flattened) = build_groups(&page_view, &group_descriptions);
            page_view = flattened;
            groups
        } else {
            full_groups.clone()
        };
        let digest = groups_digest(&groups);

        tracing::debug!(
            target: targets::COLLECTION_VIEW,
            items = view.len(),
            page_items = page_view.len(),
            page_index,
            groups = groups.len(),
            "view refreshed"
        );

        let current_changed = {
            let mut state = self.state.write();
            let current = if reset_current {
                (!page_view.is_empty()).then_some(0)
            } else {
                anchor(previous.as_ref(), &page_view, state.current)
            };
            state.view = view;
            state.page_view = page_view;
            state.groups = groups;
            state.full_groups = full_groups;
            state.digest = digest;
            state.page_index = page_index;
            state.current = current;
            let now = current.and_then(|i| state.page_view.get(i));
            !same_item(previous.as_ref(), now)
        };
        if current_changed {
            self.current_changed.raise_default(self);
        }
    }

    fn raise_collection_changed(&self, args: CollectionChangedEventArgs<SharedItem<R>>, track: bool) {
        if track && args.action == CollectionChangedAction::Change {
            if let Some(item) = &args.item {
                self.track_item_changed(item);
            }
        }
        tracing::trace!(
            target: targets::COLLECTION_VIEW,
            action = ?args.action,
            index = ?args.index,
            "collection changed"
        );
        self.collection_changed.raise(self, &args);
    }

    /// Report an in-place change to `item` made outside an edit transaction.
    ///
    /// Records the item as edited when change tracking is on. Returns false
    /// if the item is not in the current page.
    pub fn notify_item_changed(&self, item: &SharedItem<R>) -> bool {
        let Some(index) = self.index_of(item) else {
            return false;
        };
        self.raise_collection_changed(
            CollectionChangedEventArgs::new(CollectionChangedAction::Change, item.clone(), index),
            true,
        );
        true
    }

    // Read accessors

    /// Items in the current page, in display order.
    pub fn items(&self) -> Vec<SharedItem<R>> {
        self.state.read().page_view.clone()
    }

    /// Number of items in the current page.
    pub fn item_count(&self) -> usize {
        self.state.read().page_view.len()
    }

    /// Number of items in the view across all pages.
    pub fn total_item_count(&self) -> usize {
        self.state.read().view.len()
    }

    /// Whether the current page has no items.
    pub fn is_empty(&self) -> bool {
        self.state.read().page_view.is_empty()
    }

    /// Position of `item` in the current page.
    pub fn index_of(&self, item: &SharedItem<R>) -> Option<usize> {
        self.state.read().page_view.iter().position(|i| Arc::ptr_eq(i, item))
    }

    /// Whether `item` is in the current page.
    pub fn contains(&self, item: &SharedItem<R>) -> bool {
        self.index_of(item).is_some()
    }

    /// Top-level groups of the current page.
    pub fn groups(&self) -> Vec<Arc<CollectionViewGroup<R>>> {
        self.state.read().groups.clone()
    }

    /// Top-level groups of the whole view, ignoring paging.
    pub fn full_groups(&self) -> Vec<Arc<CollectionViewGroup<R>>> {
        self.state.read().full_groups.clone()
    }

    /// Calculate an aggregate over every item in the view, across pages.
    pub fn get_aggregate(&self, aggregate: Aggregate, binding: Option<&str>) -> Result<Value> {
        let items = self.state.read().view.clone();
        get_aggregate(aggregate, &items, binding)
    }

    // Cursor

    /// The item under the cursor.
    pub fn current_item(&self) -> Option<SharedItem<R>> {
        let state = self.state.read();
        state.current.and_then(|i| state.page_view.get(i).cloned())
    }

    /// Cursor position in the current page; `None` only when the page is empty.
    pub fn current_position(&self) -> Option<usize> {
        self.state.read().current
    }

    /// Move the cursor to `item`. Returns false if it is not in the page.
    pub fn move_current_to(&self, item: &SharedItem<R>) -> bool {
        match self.index_of(item) {
            Some(index) => self.move_current_to_position(Some(index)),
            None => false,
        }
    }

    /// Move the cursor to `position`.
    ///
    /// `None` is only reachable on an empty page. Pending transactions on
    /// other items are committed first. Returns whether the cursor ended up
    /// at the requested position.
    pub fn move_current_to_position(&self, position: Option<usize>) -> bool {
        let (len, current, target) = {
            let state = self.state.read();
            let target = position.and_then(|i| state.page_view.get(i).cloned());
            (state.page_view.len(), state.current, target)
        };

        let in_range = position.map_or(len == 0, |i| i < len);
        if in_range && position != current {
            let args = CancelEventArgs::new();
            self.current_changing.raise(self, &args);
            if args.is_canceled() {
                tracing::trace!(target: targets::COLLECTION_VIEW, "cursor move canceled");
            } else {
                if self
                    .current_edit_item()
                    .is_some_and(|edit| !same_item(Some(&edit), target.as_ref()))
                {
                    self.commit_edit();
                }
                if self
                    .current_add_item()
                    .is_some_and(|new| !same_item(Some(&new), target.as_ref()))
                {
                    self.commit_new();
                }

                // A commit may have reordered the page.
                let position = match &target {
                    Some(target) => self
                        .index_of(target)
                        .or_else(|| position.filter(|&i| i < self.item_count())),
                    None => None,
                };
                self.state.write().current = position;
                self.current_changed.raise_default(self);
            }
        }
        self.current_position() == position
    }

    /// Move the cursor to the first item of the page.
    pub fn move_current_to_first(&self) -> bool {
        self.move_current_to_position(Some(0))
    }

    /// Move the cursor to the last item of the page.
    pub fn move_current_to_last(&self) -> bool {
        self.move_current_to_position(self.item_count().checked_sub(1))
    }

    /// Move forward one item. Returns false past the last item.
    pub fn move_current_to_next(&self) -> bool {
        self.move_current_to_position(Some(self.current_position().map_or(0, |i| i + 1)))
    }

    /// Move back one item. Returns false at the first item, leaving the
    /// cursor in place.
    pub fn move_current_to_previous(&self) -> bool {
        match self.current_position() {
            Some(i) if i > 0 => self.move_current_to_position(Some(i - 1)),
            _ => false,
        }
    }

    // Transactions

    /// Whether an add transaction is pending.
    pub fn is_adding_new(&self) -> bool {
        self.state.read().new_item.is_some()
    }

    /// Whether an edit transaction is pending.
    pub fn is_editing_item(&self) -> bool {
        self.state.read().edit_item.is_some()
    }

    /// The item of the pending add transaction.
    pub fn current_add_item(&self) -> Option<SharedItem<R>> {
        self.state.read().new_item.clone()
    }

    /// The item of the pending edit transaction.
    pub fn current_edit_item(&self) -> Option<SharedItem<R>> {
        self.state.read().edit_item.clone()
    }

    /// Create a new item, append it to the source and make it current.
    ///
    /// The item is created by the configured creator, or `R::default()`.
    /// It is shown at the end of the page and of the last group at each
    /// level until it is committed.
    pub fn add_new(&self) -> Result<SharedItem<R>>
    where
        R: Default,
    {
        let creator = self.settings.read().new_item_creator.clone();
        self.begin_add(move || match creator {
            Some(creator) => creator(),
            None => R::default(),
        })
    }

    /// Like [`add_new`](Self::add_new), using `record` as the new item.
    pub fn add_new_item(&self, record: R) -> Result<SharedItem<R>> {
        self.begin_add(move || record)
    }

    fn begin_add<F>(&self, create: F) -> Result<SharedItem<R>>
    where
        F: FnOnce() -> R,
    {
        if !self.can_add_new() {
            tracing::warn!(target: targets::COLLECTION_VIEW, "add_new called on a view that cannot add items");
            return Err(CollectionError::CannotAddNew);
        }
        let Some(source) = self.source_collection() else {
            tracing::warn!(target: targets::COLLECTION_VIEW, "add_new called on a view without a source");
            return Err(CollectionError::NoSourceCollection);
        };

        self.commit_edit();
        self.commit_new();

        let item = shared(create());
        self.suppress_refresh(|| source.push(item.clone()));

        let index = {
            let mut state = self.state.write();
            state.new_item = Some(item.clone());
            state.view.push(item.clone());
            state.page_view.push(item.clone());
            let mut group = state.groups.last().cloned();
            while let Some(current) = group {
                current.push_item(item.clone());
                group = current.groups().last().cloned();
            }
            state.page_view.len() - 1
        };
        tracing::debug!(target: targets::COLLECTION_VIEW, index, "new item added");

        self.raise_collection_changed(
            CollectionChangedEventArgs::new(CollectionChangedAction::Add, item.clone(), index),
            false,
        );
        self.move_current_to(&item);
        Ok(item)
    }

    /// End the add transaction, keeping the new item.
    pub fn commit_new(&self) {
        let Some(item) = self.state.write().new_item.take() else {
            return;
        };
        let (index, digest) = self.position_and_digest(&item);
        self.perform_refresh(false);

        if self.track_changes() {
            if let Some(i) = self.items_edited.index_of(&item) {
                self.items_edited.remove_at(i);
            }
            if !self.items_added.contains(&item) {
                self.items_added.push(item.clone());
            }
        }
        self.notify_change_or_reset(item, index, digest);
    }

    /// End the add transaction, removing the new item.
    pub fn cancel_new(&self) -> Result<()> {
        match self.current_add_item() {
            Some(item) => self.remove(&item).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Begin editing `item`, snapshotting its fields.
    ///
    /// Any other pending transaction is committed first. Editing the item
    /// that is already being edited is a no-op. Returns whether an edit of
    /// `item` is open afterwards.
    pub fn edit_item(&self, item: &SharedItem<R>) -> bool {
        {
            let state = self.state.read();
            if state.edit_item.as_ref().is_some_and(|edit| Arc::ptr_eq(edit, item)) {
                return true;
            }
            if state.new_item.as_ref().is_some_and(|new| Arc::ptr_eq(new, item)) {
                return false;
            }
        }
        if !self.move_current_to(item) {
            return false;
        }
        self.commit_edit();
        self.commit_new();

        let snapshot = RecordSnapshot::capture(&*item.read());
        let mut state = self.state.write();
        state.edit_item = Some(item.clone());
        state.edit_snapshot = Some(snapshot);
        true
    }

    /// End the edit transaction, keeping the changes.
    pub fn commit_edit(&self) {
        let (item, snapshot) = {
            let mut state = self.state.write();
            let Some(item) = state.edit_item.take() else {
                return;
            };
            (item, state.edit_snapshot.take())
        };
        let modified = snapshot.is_some_and(|snapshot| !snapshot.matches(&*item.read()));
        let (index, digest) = self.position_and_digest(&item);
        self.perform_refresh(false);

        if modified {
            self.track_item_changed(&item);
        }
        self.notify_change_or_reset(item, index, digest);
    }

    /// End the edit transaction, restoring the snapshot.
    pub fn cancel_edit(&self) -> Result<()> {
        let Some(item) = self.current_edit_item() else {
            return Ok(());
        };
        if !self.can_cancel_edit() {
            tracing::warn!(target: targets::COLLECTION_VIEW, "cancel_edit called on a view that cannot cancel edits");
            return Err(CollectionError::CannotCancelEdit);
        }

        let snapshot = {
            let mut state = self.state.write();
            state.edit_item = None;
            state.edit_snapshot.take()
        };
        if let Some(snapshot) = snapshot {
            snapshot.restore(&mut *item.write());
        }
        if let Some(index) = self.index_of(&item) {
            self.raise_collection_changed(
                CollectionChangedEventArgs::new(CollectionChangedAction::Change, item, index),
                false,
            );
        }
        Ok(())
    }

    /// Remove `item` from the source collection.
    ///
    /// A pending add of the item is abandoned and a pending edit is rolled
    /// back to its snapshot. Returns whether the
    /// item was found in the source.
    pub fn remove(&self, item: &SharedItem<R>) -> Result<bool> {
        if !self.can_remove() {
            tracing::warn!(target: targets::COLLECTION_VIEW, "remove called on a view that cannot remove items");
            return Err(CollectionError::CannotRemove);
        }

        let (was_new, snapshot) = {
            let mut state = self.state.write();
            let was_new = state.new_item.as_ref().is_some_and(|new| Arc::ptr_eq(new, item));
            if was_new {
                state.new_item = None;
            }
            let mut snapshot = None;
            if state.edit_item.as_ref().is_some_and(|edit| Arc::ptr_eq(edit, item)) {
                state.edit_item = None;
                snapshot = state.edit_snapshot.take();
            }
            (was_new, snapshot)
        };
        if let Some(snapshot) = snapshot {
            snapshot.restore(&mut *item.write());
        }
        self.remove_from_source(item, was_new)
    }

    fn remove_from_source(&self, item: &SharedItem<R>, was_new: bool) -> Result<bool> {
        let Some(source) = self.source_collection() else {
            return Ok(false);
        };
        let Some(source_index) = source.index_of(item) else {
            return Ok(false);
        };

        let (index, digest) = self.position_and_digest(item);
        self.suppress_refresh(|| source.remove_at(source_index));
        self.perform_refresh(false);

        if self.track_changes() {
            let added = self.items_added.index_of(item);
            if let Some(i) = added {
                self.items_added.remove_at(i);
            }
            if let Some(i) = self.items_edited.index_of(item) {
                self.items_edited.remove_at(i);
            }
            if added.is_none() && !was_new && !self.items_removed.contains(item) {
                self.items_removed.push(item.clone());
            }
        }

        let sorted = self.can_sort() && !self.sort_descriptions.is_empty();
        let paged = self.page_size() > 0;
        let args = match index {
            Some(index) if !sorted && !paged && digest == self.state.read().digest => {
                CollectionChangedEventArgs::new(CollectionChangedAction::Remove, item.clone(), index)
            }
            _ => CollectionChangedEventArgs::reset(),
        };
        tracing::debug!(target: targets::COLLECTION_VIEW, source_index, "item removed");
        self.raise_collection_changed(args, false);
        Ok(true)
    }

    /// Remove the item at `index` in the current page.
    pub fn remove_at(&self, index: usize) -> Result<bool> {
        if !self.can_remove() {
            tracing::warn!(target: targets::COLLECTION_VIEW, "remove_at called on a view that cannot remove items");
            return Err(CollectionError::CannotRemove);
        }
        let item = self.state.read().page_view.get(index).cloned();
        match item {
            Some(item) => self.remove(&item),
            None => Ok(false),
        }
    }

    fn position_and_digest(&self, item: &SharedItem<R>) -> (Option<usize>, String) {
        let state = self.state.read();
        (
            state.page_view.iter().position(|i| Arc::ptr_eq(i, item)),
            state.digest.clone(),
        )
    }

    /// Raise `Change` if the item kept its position and the group structure
    /// is unchanged, otherwise a reset.
    fn notify_change_or_reset(&self, item: SharedItem<R>, old_index: Option<usize>, old_digest: String) {
        let (index, digest) = self.position_and_digest(&item);
        let args = match index {
            Some(index) if Some(index) == old_index && digest == old_digest => {
                CollectionChangedEventArgs::new(CollectionChangedAction::Change, item, index)
            }
            _ => CollectionChangedEventArgs::reset(),
        };
        self.raise_collection_changed(args, false);
    }

    // Change tracking

    /// Whether added, removed and edited items are recorded.
    pub fn track_changes(&self) -> bool {
        self.settings.read().track_changes
    }

    /// Turn change tracking on or off. Turning it on clears the ledgers.
    pub fn set_track_changes(&self, track: bool) {
        let enabled = {
            let mut settings = self.settings.write();
            let enabled = track && !settings.track_changes;
            settings.track_changes = track;
            enabled
        };
        if enabled {
            self.clear_changes();
        }
    }

    /// Items added through the view since tracking started.
    pub fn items_added(&self) -> &ObservableArray<SharedItem<R>> {
        &self.items_added
    }

    /// Items removed through the view since tracking started.
    pub fn items_removed(&self) -> &ObservableArray<SharedItem<R>> {
        &self.items_removed
    }

    /// Pre-existing items edited through the view since tracking started.
    pub fn items_edited(&self) -> &ObservableArray<SharedItem<R>> {
        &self.items_edited
    }

    /// Empty the change ledgers.
    pub fn clear_changes(&self) {
        self.items_added.clear();
        self.items_removed.clear();
        self.items_edited.clear();
    }

    fn track_item_changed(&self, item: &SharedItem<R>) {
        if !self.track_changes() {
            return;
        }
        if let Some(index) = self.items_edited.index_of(item) {
            self.items_edited.notify_changed(index);
        } else if !self.items_added.contains(item) {
            self.items_edited.push(item.clone());
        }
    }

    // Paging

    /// Items per page; 0 disables paging.
    pub fn page_size(&self) -> usize {
        self.settings.read().page_size
    }

    /// Set the page size and refresh; 0 disables paging.
    pub fn set_page_size(&self, size: usize) {
        let changed = {
            let mut settings = self.settings.write();
            let changed = settings.page_size != size;
            settings.page_size = size;
            changed
        };
        if changed {
            self.refresh();
        }
    }

    /// Index of the current page.
    pub fn page_index(&self) -> usize {
        self.state.read().page_index
    }

    /// Number of pages; always at least 1.
    pub fn page_count(&self) -> usize {
        page_count_for(self.total_item_count(), self.page_size())
    }

    /// Move to page `index`, clamped to the valid range.
    ///
    /// Pending transactions are committed and the cursor moves to the first
    /// item of the new page. Returns whether the view ended up on `index`.
    pub fn move_to_page(&self, index: usize) -> bool {
        if !self.can_change_page() {
            tracing::debug!(target: targets::COLLECTION_VIEW, "page change disabled");
            return false;
        }
        let target = index.min(self.page_count() - 1);
        if target != self.page_index() {
            let args = PageChangingEventArgs::new(target);
            self.page_changing.raise(self, &args);
            if args.is_canceled() {
                tracing::debug!(target: targets::COLLECTION_VIEW, target, "page change canceled");
            } else {
                self.commit_edit();
                self.commit_new();
                self.state.write().page_index = target;
                self.perform_refresh(true);
                self.raise_collection_changed(CollectionChangedEventArgs::reset(), false);
                self.page_changed.raise_default(self);
            }
        }
        self.page_index() == index
    }

    /// Move to the first page.
    pub fn move_to_first_page(&self) -> bool {
        self.move_to_page(0)
    }

    /// Move to the last page.
    pub fn move_to_last_page(&self) -> bool {
        self.move_to_page(self.page_count() - 1)
    }

    /// Move to the following page.
    pub fn move_to_next_page(&self) -> bool {
        self.move_to_page(self.page_index() + 1)
    }

    /// Move to the preceding page. Returns false on the first page.
    pub fn move_to_previous_page(&self) -> bool {
        match self.page_index().checked_sub(1) {
            Some(index) => self.move_to_page(index),
            None => false,
        }
    }
}

impl<R: Record> Drop for CollectionView<R> {
    fn drop(&mut self) {
        self.detach_source();
    }
}

impl<R: Record> std::fmt::Debug for CollectionView<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CollectionView")
            .field("items", &state.view.len())
            .field("page_items", &state.page_view.len())
            .field("page_index", &state.page_index)
            .field("current", &state.current)
            .field("groups", &state.full_groups.len())
            .finish()
    }
}

/// Closes an update scope on drop.
struct UpdateScope<'a, R: Record> {
    view: &'a CollectionView<R>,
    refresh: bool,
}

impl<R: Record> Drop for UpdateScope<'_, R> {
    fn drop(&mut self) {
        if self.refresh {
            self.view.end_update();
        } else {
            let mut depth = self.view.update_depth.lock();
            *depth = depth.saturating_sub(1);
        }
    }
}

fn same_item<R>(a: Option<&SharedItem<R>>, b: Option<&SharedItem<R>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn page_count_for(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        1
    } else {
        len.div_ceil(page_size).max(1)
    }
}

fn page_slice<T: Clone>(items: &[T], page_index: usize, page_size: usize) -> Vec<T> {
    if page_size == 0 {
        return items.to_vec();
    }
    items
        .iter()
        .skip(page_index * page_size)
        .take(page_size)
        .cloned()
        .collect()
}

/// Position of the previously current item in the new page, falling back
/// to the old position clamped to the page.
fn anchor<R>(previous: Option<&SharedItem<R>>, page_view: &[SharedItem<R>], old: Option<usize>) -> Option<usize> {
    if page_view.is_empty() {
        return None;
    }
    if let Some(index) = previous.and_then(|p| page_view.iter().position(|i| Arc::ptr_eq(i, p))) {
        return Some(index);
    }
    Some(old.unwrap_or(0).min(page_view.len() - 1))
}

static_assertions::assert_impl_all!(CollectionView<crate::record::DataRecord>: Send, Sync);
