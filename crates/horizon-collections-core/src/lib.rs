//! Core systems for Horizon Collections.
//!
//! This crate provides the foundational pieces shared by the collection
//! engine:
//!
//! - **Events**: Typed, ordered, synchronous publish/subscribe ([`Event`])
//! - **Cancelable arguments**: Veto support for "changing" notifications ([`CancelEventArgs`])
//! - **Logging**: Tracing targets, span names and tree formatting options ([`logging`])
//!
//! # Event Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use horizon_collections_core::{CancelEventArgs, Event};
//!
//! struct Pager;
//!
//! let page_changing = Event::<Pager, CancelEventArgs>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let seen_clone = seen.clone();
//! page_changing.add_handler(move |_, args| {
//!     seen_clone.fetch_add(1, Ordering::SeqCst);
//!     args.cancel();
//! });
//!
//! let args = CancelEventArgs::new();
//! page_changing.raise(&Pager, &args);
//! assert!(args.is_canceled());
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

pub mod event;
pub mod logging;

pub use event::{CancelEventArgs, ContextId, Event, EventArgs, HandlerId};
pub use logging::{PerfSpan, TreeFormatOptions, TreeStyle};
