//! Logging and debugging facilities for Horizon Collections.
//!
//! This module provides:
//! - Target and span names for filtering `tracing` output by subsystem
//! - Formatting options for debug renderings of group trees
//! - Performance tracing hooks for profiling
//!
//! # Tracing Integration
//!
//! Horizon Collections uses the `tracing` crate for instrumentation. To see
//! logs, install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_collections=debug")
//!         .init();
//! }
//! ```

/// Span names used throughout Horizon Collections for tracing.
pub mod span_names {
    /// Refresh pipeline span.
    pub const REFRESH: &str = "horizon_collections::refresh";
    /// Group tree construction span.
    pub const GROUPING: &str = "horizon_collections::grouping";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_collections_core";
    /// Event system target.
    pub const EVENT: &str = "horizon_collections_core::event";
    /// Observable array target.
    pub const OBSERVABLE: &str = "horizon_collections::observable";
    /// Collection view target.
    pub const COLLECTION_VIEW: &str = "horizon_collections::collection_view";
    /// Grouping engine target.
    pub const GROUPING: &str = "horizon_collections::grouping";
    /// Aggregation target.
    pub const AGGREGATE: &str = "horizon_collections::aggregate";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

impl TreeStyle {
    /// Connector drawn before a node: `(continuing, last)`.
    pub fn connectors(self) -> (&'static str, &'static str) {
        match self {
            TreeStyle::Ascii => ("+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("- ", "- "),
        }
    }

    /// Vertical rule drawn for ancestor levels that still have siblings.
    pub fn branch(self) -> &'static str {
        match self {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        }
    }
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show item counts next to each node.
    pub show_counts: bool,
    /// Whether to show the structural path of each node.
    pub show_paths: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_counts: true,
            show_paths: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_paths: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_counts: false,
            show_paths: false,
            ..Default::default()
        }
    }

    /// Build the prefix string for a node at `depth`.
    ///
    /// `ancestors_last[i]` tells whether the ancestor at depth `i + 1` was the
    /// last of its siblings, which decides whether a vertical rule is drawn.
    pub fn prefix(&self, ancestors_last: &[bool], is_last: bool) -> String {
        let mut prefix = String::new();
        for &last in ancestors_last {
            if last {
                prefix.push(' ');
            } else {
                prefix.push_str(self.style.branch());
            }
            for _ in 0..self.indent_size {
                prefix.push(' ');
            }
        }
        let (middle, end) = self.style.connectors();
        prefix.push_str(if is_last { end } else { middle });
        prefix
    }
}

/// A guard that emits a tracing span while alive.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::CORE, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_root_level() {
        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..Default::default()
        };
        assert_eq!(options.prefix(&[], false), "+-- ");
        assert_eq!(options.prefix(&[], true), "`-- ");
    }

    #[test]
    fn test_prefix_nested() {
        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            indent_size: 1,
            ..Default::default()
        };
        assert_eq!(options.prefix(&[false], true), "| `-- ");
        assert_eq!(options.prefix(&[true], false), "  +-- ");
    }

    #[test]
    fn test_minimal_options() {
        let options = TreeFormatOptions::minimal();
        assert!(!options.show_counts);
        assert!(!options.show_paths);
    }

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new("test_operation");
    }
}
