//! Builder and configuration for collection views.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::collection::group::{PropertyGroupDescription, SharedGroupDescription};
use crate::collection::sort::{SortComparerFn, SortConverterFn, SortDescription};
use crate::collection::view::CollectionView;
use crate::observable::ObservableArray;
use crate::record::{shared, Record, SharedItem};
use crate::value::Value;

/// Predicate deciding whether an item is visible.
pub type FilterFn<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// Factory used by `add_new`.
pub type NewItemFn<R> = Arc<dyn Fn() -> R + Send + Sync>;

/// Switches controlling which operations a view allows.
///
/// Everything is enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionViewCapabilities {
    pub can_filter: bool,
    pub can_group: bool,
    pub can_sort: bool,
    pub can_add_new: bool,
    pub can_cancel_edit: bool,
    pub can_remove: bool,
    pub can_change_page: bool,
}

impl Default for CollectionViewCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl CollectionViewCapabilities {
    /// Every capability enabled.
    pub fn all() -> Self {
        Self {
            can_filter: true,
            can_group: true,
            can_sort: true,
            can_add_new: true,
            can_cancel_edit: true,
            can_remove: true,
            can_change_page: true,
        }
    }

    /// A read-only view: shaping and paging stay enabled, editing is off.
    pub fn read_only() -> Self {
        Self {
            can_add_new: false,
            can_cancel_edit: false,
            can_remove: false,
            ..Self::all()
        }
    }
}

/// Mutable configuration of a view.
pub(crate) struct ViewSettings<R> {
    pub filter: Option<FilterFn<R>>,
    pub capabilities: CollectionViewCapabilities,
    pub page_size: usize,
    pub stable_sort: bool,
    pub track_changes: bool,
    pub new_item_creator: Option<NewItemFn<R>>,
    pub sort_converter: Option<SortConverterFn<R>>,
    pub sort_comparer: Option<SortComparerFn>,
}

impl<R> Default for ViewSettings<R> {
    fn default() -> Self {
        Self {
            filter: None,
            capabilities: CollectionViewCapabilities::default(),
            page_size: 0,
            stable_sort: false,
            track_changes: false,
            new_item_creator: None,
            sort_converter: None,
            sort_comparer: None,
        }
    }
}

/// Builder pattern for creating collection views.
///
/// # Example
///
/// ```
/// use horizon_collections::{CollectionViewBuilder, DataRecord, Value};
///
/// let view = CollectionViewBuilder::new()
///     .items((1..=6).map(|n| DataRecord::new().with("n", n)))
///     .filter(|record: &DataRecord| record.get("n").and_then(Value::as_i64).unwrap_or(0) % 2 == 0)
///     .sort_by("n", false)
///     .build();
///
/// let first = view.current_item().unwrap();
/// assert_eq!(first.read().get("n"), Some(&Value::from(6)));
/// assert_eq!(view.item_count(), 3);
/// ```
pub struct CollectionViewBuilder<R: Record> {
    source: Option<Arc<ObservableArray<SharedItem<R>>>>,
    settings: ViewSettings<R>,
    sort_descriptions: Vec<SortDescription>,
    group_descriptions: Vec<SharedGroupDescription<R>>,
}

impl<R: Record> Default for CollectionViewBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> CollectionViewBuilder<R> {
    /// Creates a builder over an empty source collection.
    pub fn new() -> Self {
        Self {
            source: Some(Arc::new(ObservableArray::new())),
            settings: ViewSettings::default(),
            sort_descriptions: Vec::new(),
            group_descriptions: Vec::new(),
        }
    }

    /// Uses an existing observable collection as the source.
    pub fn source(mut self, source: Arc<ObservableArray<SharedItem<R>>>) -> Self {
        self.source = Some(source);
        self
    }

    /// Builds the view without a source collection.
    pub fn detached(mut self) -> Self {
        self.source = None;
        self
    }

    /// Wraps `items` in a new source collection.
    pub fn items<I>(self, items: I) -> Self
    where
        I: IntoIterator<Item = R>,
    {
        self.source(Arc::new(items.into_iter().map(shared).collect()))
    }

    /// Adds a filter function.
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.settings.filter = Some(Arc::new(f));
        self
    }

    /// Appends a sort on `property`.
    pub fn sort_by(self, property: impl Into<String>, ascending: bool) -> Self {
        self.sort_description(SortDescription::new(property, ascending))
    }

    /// Appends a sort description.
    pub fn sort_description(mut self, description: SortDescription) -> Self {
        self.sort_descriptions.push(description);
        self
    }

    /// Appends a grouping level on `property`.
    pub fn group_by(self, property: impl Into<String>) -> Self {
        self.group_description(Arc::new(PropertyGroupDescription::new(property)))
    }

    /// Appends a grouping level.
    pub fn group_description(mut self, description: SharedGroupDescription<R>) -> Self {
        self.group_descriptions.push(description);
        self
    }

    /// Items per page; 0 (the default) disables paging.
    pub fn page_size(mut self, size: usize) -> Self {
        self.settings.page_size = size;
        self
    }

    /// Sets which operations the view allows.
    pub fn capabilities(mut self, capabilities: CollectionViewCapabilities) -> Self {
        self.settings.capabilities = capabilities;
        self
    }

    /// Keep items with equal sort keys in source order.
    pub fn stable_sort(mut self, stable: bool) -> Self {
        self.settings.stable_sort = stable;
        self
    }

    /// Record added, removed and edited items.
    pub fn track_changes(mut self, track: bool) -> Self {
        self.settings.track_changes = track;
        self
    }

    /// Factory used by `add_new` instead of `R::default()`.
    pub fn new_item_creator<F>(mut self, f: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.settings.new_item_creator = Some(Arc::new(f));
        self
    }

    /// Maps each sort key before comparison.
    pub fn sort_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&SortDescription, &R, Value, bool) -> Value + Send + Sync + 'static,
    {
        self.settings.sort_converter = Some(Arc::new(f));
        self
    }

    /// Compares sort keys instead of the default value ordering.
    pub fn sort_comparer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Option<Ordering> + Send + Sync + 'static,
    {
        self.settings.sort_comparer = Some(Arc::new(f));
        self
    }

    /// Builds the view and performs the initial refresh.
    pub fn build(self) -> Arc<CollectionView<R>> {
        CollectionView::with_settings(
            self.settings,
            self.sort_descriptions,
            self.group_descriptions,
            self.source,
        )
    }
}
