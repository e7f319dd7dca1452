//! Collection views over observable sources.
//!
//! # Core Types
//!
//! - `CollectionView`: Filters, sorts, groups and pages a source collection
//! - `SortDescription`: A sort key and direction
//! - `GroupDescription`: Decides which group an item belongs to at a level
//! - `CollectionViewGroup`: A node of the group tree
//! - `CollectionViewBuilder`: Configures and builds a view
//!
//! # Capability Traits
//!
//! - `ItemCollectionView`: Reading, cursor and shaping
//! - `EditableItemCollectionView`: Add/edit transactions and removal
//! - `PagedItemCollectionView`: Paging
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────┐  changes  ┌──────────────────┐  events   ┌──────────┐
//! │ ObservableArray  │──────────>│  CollectionView  │──────────>│ Consumer │
//! │ (source items)   │           │ filter/sort/group│           │          │
//! └──────────────────┘           │ page/cursor      │<──────────│          │
//!          ^                     └──────────────────┘ add/edit  └──────────┘
//!          └───────────────────────────────┘ push/remove
//! ```

mod builder;
mod group;
mod sort;
mod traits;
mod view;

pub use builder::{CollectionViewBuilder, CollectionViewCapabilities, FilterFn, NewItemFn};
pub use group::{
    CollectionViewGroup, GroupDescription, GroupNameFn, GroupTreeDebug, PropertyGroupDescription,
    SharedGroupDescription,
};
pub use sort::{SortComparerFn, SortConverterFn, SortDescription};
pub use traits::{EditableItemCollectionView, ItemCollectionView, PagedItemCollectionView};
pub use view::{CollectionView, PageChangingEventArgs, SourceCollection, ViewChangedEvent};
