//! Horizon Collections - Sortable, filterable, groupable and pageable views
//! over observable collections.
//!
//! This is the main crate. It re-exports the core event types and the
//! `Record` derive macro.
//!
//! # Example
//!
//! ```
//! use horizon_collections::{Aggregate, CollectionView, Record, SortDescription, Value};
//!
//! #[derive(Record, Clone, Default)]
//! struct Sale {
//!     region: String,
//!     city: String,
//!     amount: f64,
//! }
//!
//! let view = CollectionView::builder()
//!     .items(vec![
//!         Sale { region: "west".into(), city: "Seattle".into(), amount: 120.0 },
//!         Sale { region: "east".into(), city: "Boston".into(), amount: 80.0 },
//!         Sale { region: "east".into(), city: "Albany".into(), amount: 40.0 },
//!     ])
//!     .group_by("region")
//!     .build();
//!
//! view.sort_descriptions().push(SortDescription::ascending("city"));
//!
//! let groups = view.groups();
//! assert_eq!(groups[0].name(), &Value::from("east"));
//! assert_eq!(
//!     groups[0].get_aggregate(Aggregate::Sum, Some("amount"), None).unwrap(),
//!     Value::from(120.0)
//! );
//! ```

// Lets `#[derive(Record)]` refer to `::horizon_collections` inside this crate.
extern crate self as horizon_collections;

pub mod aggregate;
pub mod binding;
pub mod collection;
pub mod error;
pub mod observable;
pub mod record;
pub mod value;

pub use aggregate::{get_aggregate, Aggregate, AggregateSource};
pub use binding::Binding;
pub use collection::*;
pub use error::{CollectionError, Result};
pub use observable::{
    CollectionChangedAction, CollectionChangedEvent, CollectionChangedEventArgs, ItemIdentity,
    ObservableArray,
};
pub use record::{shared, DataRecord, Record, RecordSnapshot, SharedItem};
pub use value::{FromValue, Value};

pub use horizon_collections_core::{
    logging, CancelEventArgs, ContextId, Event, EventArgs, HandlerId, PerfSpan, TreeFormatOptions,
    TreeStyle,
};
pub use horizon_collections_macros::Record;
