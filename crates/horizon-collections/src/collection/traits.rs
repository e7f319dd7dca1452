//! Capability traits implemented by collection views.
//!
//! Hosts that only need to read, edit or page a view can depend on the
//! narrowest trait instead of the concrete [`CollectionView`].

use std::sync::Arc;

use crate::collection::group::{CollectionViewGroup, SharedGroupDescription};
use crate::collection::sort::SortDescription;
use crate::collection::view::CollectionView;
use crate::error::Result;
use crate::observable::ObservableArray;
use crate::record::{Record, SharedItem};

/// A filtered, sorted, grouped view with a current-item cursor.
pub trait ItemCollectionView<R: Record>: Send + Sync {
    /// Items in the current page, in display order.
    fn items(&self) -> Vec<SharedItem<R>>;

    /// Top-level groups of the current page.
    fn groups(&self) -> Vec<Arc<CollectionViewGroup<R>>>;

    /// Top-level groups of the whole view, ignoring paging.
    fn full_groups(&self) -> Vec<Arc<CollectionViewGroup<R>>> {
        self.groups()
    }

    /// The item under the cursor.
    fn current_item(&self) -> Option<SharedItem<R>>;

    /// Cursor position in the current page.
    fn current_position(&self) -> Option<usize>;

    /// Move the cursor to `item`. Returns false if it is not in the view.
    fn move_current_to(&self, item: &SharedItem<R>) -> bool;

    /// Move the cursor to `position`; `None` is only reachable on an empty page.
    ///
    /// Returns whether the cursor ended up at the requested position.
    fn move_current_to_position(&self, position: Option<usize>) -> bool;

    /// Move the cursor to the first item.
    fn move_current_to_first(&self) -> bool {
        self.move_current_to_position(Some(0))
    }

    /// Move the cursor to the last item.
    fn move_current_to_last(&self) -> bool {
        self.move_current_to_position(self.items().len().checked_sub(1))
    }

    /// Move forward one item.
    fn move_current_to_next(&self) -> bool {
        self.move_current_to_position(Some(self.current_position().map_or(0, |i| i + 1)))
    }

    /// Move back one item; at the first item the cursor stays put.
    fn move_current_to_previous(&self) -> bool {
        match self.current_position() {
            Some(i) if i > 0 => self.move_current_to_position(Some(i - 1)),
            _ => false,
        }
    }

    /// Rebuild the view from its source.
    fn refresh(&self);

    /// Whether the filter is applied.
    fn can_filter(&self) -> bool;

    /// Whether the group descriptions are applied.
    fn can_group(&self) -> bool;

    /// Whether the sort descriptions are applied.
    fn can_sort(&self) -> bool;

    /// Sort keys applied in order.
    fn sort_descriptions(&self) -> &ObservableArray<SortDescription>;

    /// Grouping levels, outermost first.
    fn group_descriptions(&self) -> &ObservableArray<SharedGroupDescription<R>>;
}

/// A view that supports add/edit transactions and removal.
pub trait EditableItemCollectionView<R: Record>: ItemCollectionView<R> {
    /// Whether `add_new` is allowed.
    fn can_add_new(&self) -> bool;

    /// Whether `cancel_edit` is allowed.
    fn can_cancel_edit(&self) -> bool;

    /// Whether items may be removed.
    fn can_remove(&self) -> bool;

    /// Whether an add transaction is pending.
    fn is_adding_new(&self) -> bool;

    /// Whether an edit transaction is pending.
    fn is_editing_item(&self) -> bool;

    /// The item of the pending add transaction.
    fn current_add_item(&self) -> Option<SharedItem<R>>;

    /// The item of the pending edit transaction.
    fn current_edit_item(&self) -> Option<SharedItem<R>>;

    /// Create a new item, append it to the source and make it current.
    fn add_new(&self) -> Result<SharedItem<R>>;

    /// Keep the pending new item.
    fn commit_new(&self);

    /// Drop the pending new item.
    fn cancel_new(&self) -> Result<()>;

    /// Begin editing `item`. Returns whether an edit of `item` is open.
    fn edit_item(&self, item: &SharedItem<R>) -> bool;

    /// Keep the pending edit.
    fn commit_edit(&self);

    /// Roll the pending edit back to its snapshot.
    fn cancel_edit(&self) -> Result<()>;

    /// Remove `item` from the source. Returns whether it was found.
    fn remove(&self, item: &SharedItem<R>) -> Result<bool>;

    /// Remove the item at `index` in the current page.
    fn remove_at(&self, index: usize) -> Result<bool>;
}

/// A view that splits its items into pages.
pub trait PagedItemCollectionView<R: Record>: ItemCollectionView<R> {
    /// Whether the page may change.
    fn can_change_page(&self) -> bool;

    /// Items per page; 0 disables paging.
    fn page_size(&self) -> usize;

    /// Set the page size; 0 disables paging.
    fn set_page_size(&self, size: usize);

    /// Index of the current page.
    fn page_index(&self) -> usize;

    /// Number of pages, at least 1.
    fn page_count(&self) -> usize;

    /// Items in the whole view, across all pages.
    fn total_item_count(&self) -> usize;

    /// Move to page `index`. Returns whether the view ended up there.
    fn move_to_page(&self, index: usize) -> bool;

    /// Move to the first page.
    fn move_to_first_page(&self) -> bool {
        self.move_to_page(0)
    }

    /// Move to the last page.
    fn move_to_last_page(&self) -> bool {
        self.move_to_page(self.page_count().saturating_sub(1))
    }

    /// Move to the following page.
    fn move_to_next_page(&self) -> bool {
        self.move_to_page(self.page_index() + 1)
    }

    /// Move to the preceding page.
    fn move_to_previous_page(&self) -> bool {
        match self.page_index().checked_sub(1) {
            Some(index) => self.move_to_page(index),
            None => false,
        }
    }
}

impl<R: Record> ItemCollectionView<R> for CollectionView<R> {
    fn items(&self) -> Vec<SharedItem<R>> {
        CollectionView::items(self)
    }

    fn groups(&self) -> Vec<Arc<CollectionViewGroup<R>>> {
        CollectionView::groups(self)
    }

    fn full_groups(&self) -> Vec<Arc<CollectionViewGroup<R>>> {
        CollectionView::full_groups(self)
    }

    fn current_item(&self) -> Option<SharedItem<R>> {
        CollectionView::current_item(self)
    }

    fn current_position(&self) -> Option<usize> {
        CollectionView::current_position(self)
    }

    fn move_current_to(&self, item: &SharedItem<R>) -> bool {
        CollectionView::move_current_to(self, item)
    }

    fn move_current_to_position(&self, position: Option<usize>) -> bool {
        CollectionView::move_current_to_position(self, position)
    }

    fn refresh(&self) {
        CollectionView::refresh(self)
    }

    fn can_filter(&self) -> bool {
        CollectionView::can_filter(self)
    }

    fn can_group(&self) -> bool {
        CollectionView::can_group(self)
    }

    fn can_sort(&self) -> bool {
        CollectionView::can_sort(self)
    }

    fn sort_descriptions(&self) -> &ObservableArray<SortDescription> {
        CollectionView::sort_descriptions(self)
    }

    fn group_descriptions(&self) -> &ObservableArray<SharedGroupDescription<R>> {
        CollectionView::group_descriptions(self)
    }
}

impl<R: Record + Default> EditableItemCollectionView<R> for CollectionView<R> {
    fn can_add_new(&self) -> bool {
        CollectionView::can_add_new(self)
    }

    fn can_cancel_edit(&self) -> bool {
        CollectionView::can_cancel_edit(self)
    }

    fn can_remove(&self) -> bool {
        CollectionView::can_remove(self)
    }

    fn is_adding_new(&self) -> bool {
        CollectionView::is_adding_new(self)
    }

    fn is_editing_item(&self) -> bool {
        CollectionView::is_editing_item(self)
    }

    fn current_add_item(&self) -> Option<SharedItem<R>> {
        CollectionView::current_add_item(self)
    }

    fn current_edit_item(&self) -> Option<SharedItem<R>> {
        CollectionView::current_edit_item(self)
    }

    fn add_new(&self) -> Result<SharedItem<R>> {
        CollectionView::add_new(self)
    }

    fn commit_new(&self) {
        CollectionView::commit_new(self)
    }

    fn cancel_new(&self) -> Result<()> {
        CollectionView::cancel_new(self)
    }

    fn edit_item(&self, item: &SharedItem<R>) -> bool {
        CollectionView::edit_item(self, item)
    }

    fn commit_edit(&self) {
        CollectionView::commit_edit(self)
    }

    fn cancel_edit(&self) -> Result<()> {
        CollectionView::cancel_edit(self)
    }

    fn remove(&self, item: &SharedItem<R>) -> Result<bool> {
        CollectionView::remove(self, item)
    }

    fn remove_at(&self, index: usize) -> Result<bool> {
        CollectionView::remove_at(self, index)
    }
}

impl<R: Record> PagedItemCollectionView<R> for CollectionView<R> {
    fn can_change_page(&self) -> bool {
        CollectionView::can_change_page(self)
    }

    fn page_size(&self) -> usize {
        CollectionView::page_size(self)
    }

    fn set_page_size(&self, size: usize) {
        CollectionView::set_page_size(self, size)
    }

    fn page_index(&self) -> usize {
        CollectionView::page_index(self)
    }

    fn page_count(&self) -> usize {
        CollectionView::page_count(self)
    }

    fn total_item_count(&self) -> usize {
        CollectionView::total_item_count(self)
    }

    fn move_to_page(&self, index: usize) -> bool {
        CollectionView::move_to_page(self, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataRecord;

    fn view() -> Arc<CollectionView<DataRecord>> {
        CollectionView::from_items((0..5).map(|n| DataRecord::new().with("n", n)))
    }

    fn walk(view: &dyn ItemCollectionView<DataRecord>) -> Vec<Option<usize>> {
        let mut positions = vec![view.current_position()];
        view.move_current_to_last();
        positions.push(view.current_position());
        view.move_current_to_previous();
        positions.push(view.current_position());
        view.move_current_to_first();
        positions.push(view.current_position());
        view.move_current_to_previous();
        positions.push(view.current_position());
        view.move_current_to_next();
        positions.push(view.current_position());
        positions
    }

    #[test]
    fn test_cursor_defaults_through_trait_object() {
        let view = view();
        assert_eq!(
            walk(&*view),
            vec![Some(0), Some(4), Some(3), Some(0), Some(0), Some(1)]
        );
    }

    #[test]
    fn test_paging_defaults_through_trait_object() {
        let view = view();
        let paged: &dyn PagedItemCollectionView<DataRecord> = &*view;
        paged.set_page_size(2);
        assert_eq!(paged.page_count(), 3);
        assert!(paged.move_to_last_page());
        assert_eq!(paged.page_index(), 2);
        assert!(!paged.move_to_next_page());
        assert!(paged.move_to_previous_page());
        assert_eq!(paged.page_index(), 1);
        assert!(paged.move_to_first_page());
        assert!(!paged.move_to_previous_page());
        assert_eq!(paged.total_item_count(), 5);
    }

    #[test]
    fn test_editable_through_trait_object() {
        let view = view();
        let editable: &dyn EditableItemCollectionView<DataRecord> = &*view;
        let item = editable.add_new().unwrap();
        assert!(editable.is_adding_new());
        editable.commit_new();
        assert!(!editable.is_adding_new());
        assert!(editable.remove(&item).unwrap());
        assert_eq!(editable.items().len(), 5);
    }
}
