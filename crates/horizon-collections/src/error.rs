//! Error types for collection views.

/// Errors raised when a collection view operation is not permitted.
///
/// Every operation that returns one of these leaves the view unchanged.
/// Callers are expected to check the matching capability first (for
/// example [`CollectionView::can_remove`](crate::CollectionView::can_remove)
/// before calling `remove`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// `add_new` was called while `can_add_new` is false.
    #[error("adding items is disabled for this view")]
    CannotAddNew,

    /// An item removal was requested while `can_remove` is false.
    #[error("removing items is disabled for this view")]
    CannotRemove,

    /// `cancel_edit` was called while `can_cancel_edit` is false.
    #[error("canceling edits is disabled for this view")]
    CannotCancelEdit,

    /// The operation needs a source collection and the view has none.
    #[error("the view has no source collection")]
    NoSourceCollection,

    /// An aggregate kind that cannot be calculated.
    #[error("invalid aggregate: {0}")]
    InvalidAggregate(String),
}

/// Result type for collection view operations.
pub type Result<T> = std::result::Result<T, CollectionError>;
