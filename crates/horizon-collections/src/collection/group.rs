//! Group descriptions and the grouping engine.
//!
//! Grouping walks the (filtered, sorted) view once. For each item the group
//! descriptions are applied top-down to compute one group name per level;
//! items with equal names at a level share a node. Nodes are created on first
//! encounter, so groups appear in the order their first item appears.
//!
//! Only bottom-level groups receive items directly. A bottom-up pass then
//! fills every ancestor's item list with the concatenation of its
//! descendants' items.
//!
//! Each node carries a `path` made of `/`-separated ancestor names, with `/`
//! and `\` inside a name escaped by a backslash. Paths identify a group across
//! separate builds, which is how a group of a paged tree is matched to its
//! counterpart in the unpaged tree.

use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Write as FmtWrite};
use std::sync::Arc;

use horizon_collections_core::logging::{span_names, targets};
use horizon_collections_core::{PerfSpan, TreeFormatOptions};
use parking_lot::RwLock;
use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::aggregate::{get_aggregate, Aggregate};
use crate::binding::Binding;
use crate::collection::traits::ItemCollectionView;
use crate::error::Result;
use crate::record::{Record, SharedItem};
use crate::value::{PrimitiveKey, Value};

/// Derives a group name from an item and a property name.
pub type GroupNameFn<R> = Arc<dyn Fn(&R, &str) -> Value + Send + Sync>;

/// A strategy for assigning items to groups at one level.
pub trait GroupDescription<R: Record>: Send + Sync {
    /// The name of the group `item` belongs to at `level`.
    fn group_name(&self, item: &R, level: usize) -> Value;

    /// Whether two group names identify the same group.
    fn names_match(&self, a: &Value, b: &Value) -> bool {
        a == b
    }

    /// Whether primitive names may be looked up through a hash map.
    ///
    /// The map matches names by `==`. Implementations that override
    /// [`names_match`](Self::names_match) with a looser equality should
    /// return `false`, forcing a linear scan through `names_match`.
    fn keyed_lookup(&self) -> bool {
        true
    }

    /// The property this description groups on, if any.
    fn property_name(&self) -> Option<&str> {
        None
    }
}

/// Groups items by the value of a property, optionally transformed.
///
/// # Example
///
/// ```
/// use horizon_collections::{DataRecord, PropertyGroupDescription, Value};
///
/// // Group by the first letter of "name".
/// let by_initial = PropertyGroupDescription::<DataRecord>::with_converter("name", |item, property| {
///     match item.get(property) {
///         Some(Value::String(s)) => Value::from(s.chars().next().map(String::from)),
///         _ => Value::Null,
///     }
/// });
/// assert_eq!(by_initial.property(), "name");
/// ```
pub struct PropertyGroupDescription<R> {
    binding: Binding,
    converter: Option<GroupNameFn<R>>,
}

impl<R: Record> PropertyGroupDescription<R> {
    /// Group by the value of `property`.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            binding: Binding::new(property),
            converter: None,
        }
    }

    /// Group by a name derived from the item and `property`.
    pub fn with_converter<F>(property: impl Into<String>, converter: F) -> Self
    where
        F: Fn(&R, &str) -> Value + Send + Sync + 'static,
    {
        Self {
            binding: Binding::new(property),
            converter: Some(Arc::new(converter)),
        }
    }

    /// The property path being grouped on.
    pub fn property(&self) -> &str {
        self.binding.path()
    }
}

impl<R: Record> GroupDescription<R> for PropertyGroupDescription<R> {
    fn group_name(&self, item: &R, _level: usize) -> Value {
        match &self.converter {
            Some(converter) => converter(item, self.binding.path()),
            None => self.binding.get_value(item),
        }
    }

    fn property_name(&self) -> Option<&str> {
        Some(self.binding.path())
    }
}

impl<R> fmt::Debug for PropertyGroupDescription<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyGroupDescription")
            .field("property", &self.binding.path())
            .field("has_converter", &self.converter.is_some())
            .finish()
    }
}

/// A shared group description as stored in a view.
pub type SharedGroupDescription<R> = Arc<dyn GroupDescription<R>>;

/// A node in a group tree.
pub struct CollectionViewGroup<R: Record> {
    description: SharedGroupDescription<R>,
    name: Value,
    level: usize,
    is_bottom_level: bool,
    path: String,
    groups: Vec<Arc<CollectionViewGroup<R>>>,
    items: RwLock<Vec<SharedItem<R>>>,
}

impl<R: Record> CollectionViewGroup<R> {
    /// The description that produced this group.
    pub fn group_description(&self) -> &SharedGroupDescription<R> {
        &self.description
    }

    /// The group name shared by every item in the group.
    pub fn name(&self) -> &Value {
        &self.name
    }

    /// Depth of the group, starting at 0 for top-level groups.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Whether this group holds items directly rather than subgroups.
    pub fn is_bottom_level(&self) -> bool {
        self.is_bottom_level
    }

    /// Structural path made of `/`-separated ancestor names.
    ///
    /// A `/` or `\` inside a name is preceded by a backslash.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Child groups, in first-encounter order.
    pub fn groups(&self) -> &[Arc<CollectionViewGroup<R>>] {
        &self.groups
    }

    /// Every item in this group and its descendants, in view order.
    pub fn items(&self) -> Vec<SharedItem<R>> {
        self.items.read().clone()
    }

    /// Number of items in this group and its descendants.
    pub fn item_count(&self) -> usize {
        self.items.read().len()
    }

    /// Append an item to this group's item list.
    pub(crate) fn push_item(&self, item: SharedItem<R>) {
        self.items.write().push(item);
    }

    /// Calculate an aggregate over this group's items.
    ///
    /// When a view is given, the aggregate is calculated over the matching
    /// group of the view's unpaged tree, so paging does not affect the
    /// result.
    pub fn get_aggregate(
        &self,
        aggregate: Aggregate,
        binding: Option<&str>,
        view: Option<&dyn ItemCollectionView<R>>,
    ) -> Result<Value> {
        if let Some(view) = view {
            if let Some(full) = self.find_full_group(&view.full_groups()) {
                let items = full.items.read();
                return get_aggregate(aggregate, items.as_slice(), binding);
            }
        }
        let items = self.items.read();
        get_aggregate(aggregate, items.as_slice(), binding)
    }

    /// Find the group with the same level and path in another tree.
    pub fn find_full_group(
        &self,
        full_groups: &[Arc<CollectionViewGroup<R>>],
    ) -> Option<Arc<CollectionViewGroup<R>>> {
        let mut candidates = full_groups;
        'levels: loop {
            for group in candidates {
                if group.level == self.level && group.path == self.path {
                    return Some(Arc::clone(group));
                }
                if group.level < self.level && is_path_prefix(&group.path, &self.path) {
                    candidates = &group.groups;
                    continue 'levels;
                }
            }
            return None;
        }
    }
}

impl<R: Record> fmt::Debug for CollectionViewGroup<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionViewGroup")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("path", &self.path)
            .field("item_count", &self.item_count())
            .field("groups", &self.groups)
            .finish()
    }
}

fn is_path_prefix(prefix: &str, path: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Escape a group name for use as one path segment.
fn path_segment(name: &Value) -> String {
    let name = name.to_string();
    let mut segment = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '/' || c == '\\' {
            segment.push('\\');
        }
        segment.push(c);
    }
    segment
}

/// Structural fingerprint of a group tree.
///
/// Each group contributes `{"name":count` (or `{"name":*` above the bottom
/// level), followed by its children's digests, and a closing `}`. Names are
/// quoted so that no name can imitate the punctuation.
pub(crate) fn groups_digest<R: Record>(groups: &[Arc<CollectionViewGroup<R>>]) -> String {
    let mut digest = String::new();
    for group in groups {
        write_digest(group, &mut digest);
    }
    digest
}

fn write_digest<R: Record>(group: &CollectionViewGroup<R>, out: &mut String) {
    let _ = write!(out, "{{{:?}:", group.name.to_string());
    if group.is_bottom_level {
        out.push_str(&group.item_count().to_string());
    } else {
        out.push('*');
    }
    if !group.groups.is_empty() {
        out.push(',');
        for child in &group.groups {
            write_digest(child, out);
        }
    }
    out.push('}');
}

new_key_type! {
    struct NodeKey;
}

/// A group node while the tree is being built.
struct NodeBuilder<R: Record> {
    description: Option<SharedGroupDescription<R>>,
    name: Value,
    level: usize,
    is_bottom_level: bool,
    path: String,
    children: Vec<NodeKey>,
    keyed_children: HashMap<PrimitiveKey, NodeKey>,
    items: Vec<SharedItem<R>>,
}

impl<R: Record> NodeBuilder<R> {
    fn root() -> Self {
        Self {
            description: None,
            name: Value::Null,
            level: 0,
            is_bottom_level: false,
            path: String::new(),
            children: Vec::new(),
            keyed_children: HashMap::new(),
            items: Vec::new(),
        }
    }
}

/// Build a group tree from `items`.
///
/// Returns the top-level groups and the items flattened in group order.
pub(crate) fn build_groups<R: Record>(
    items: &[SharedItem<R>],
    descriptions: &[SharedGroupDescription<R>],
) -> (Vec<Arc<CollectionViewGroup<R>>>, Vec<SharedItem<R>>) {
    if descriptions.is_empty() {
        return (Vec::new(), items.to_vec());
    }

    let _perf = PerfSpan::new(span_names::GROUPING);
    tracing::trace!(target: targets::GROUPING, items = items.len(), levels = descriptions.len(), "building groups");

    let mut arena: SlotMap<NodeKey, NodeBuilder<R>> = SlotMap::with_key();
    let root = arena.insert(NodeBuilder::root());
    let bottom_level = descriptions.len() - 1;

    for item in items {
        let record = item.read_recursive();
        let mut parent = root;
        for (level, description) in descriptions.iter().enumerate() {
            let name = description.group_name(&record, level);
            let key = match find_child(&arena, parent, description.as_ref(), &name) {
                Some(key) => key,
                None => {
                    let path = format!("{}/{}", arena[parent].path, path_segment(&name));
                    let primitive = description
                        .keyed_lookup()
                        .then(|| name.primitive_key())
                        .flatten();
                    let key = arena.insert(NodeBuilder {
                        description: Some(Arc::clone(description)),
                        name,
                        level,
                        is_bottom_level: level == bottom_level,
                        path,
                        children: Vec::new(),
                        keyed_children: HashMap::new(),
                        items: Vec::new(),
                    });
                    let parent_node = &mut arena[parent];
                    parent_node.children.push(key);
                    if let Some(primitive) = primitive {
                        parent_node.keyed_children.insert(primitive, key);
                    }
                    key
                }
            };
            if level == bottom_level {
                arena[key].items.push(Arc::clone(item));
            }
            parent = key;
        }
    }

    // Breadth-first order, so reversing it visits children before parents.
    let mut order = Vec::with_capacity(arena.len());
    let mut queue = VecDeque::from([root]);
    while let Some(key) = queue.pop_front() {
        order.push(key);
        queue.extend(arena[key].children.iter().copied());
    }

    for &key in order.iter().rev() {
        if arena[key].is_bottom_level {
            continue;
        }
        let merged: Vec<SharedItem<R>> = arena[key]
            .children
            .iter()
            .flat_map(|child| arena[*child].items.iter().cloned())
            .collect();
        arena[key].items = merged;
    }

    let flattened = std::mem::take(&mut arena[root].items);

    let mut frozen: SecondaryMap<NodeKey, Arc<CollectionViewGroup<R>>> = SecondaryMap::new();
    let mut top_level = Vec::new();
    for &key in order.iter().rev() {
        let children: Vec<Arc<CollectionViewGroup<R>>> = arena[key]
            .children
            .iter()
            .filter_map(|child| frozen.remove(*child))
            .collect();
        if key == root {
            top_level = children;
            break;
        }
        let Some(node) = arena.remove(key) else {
            continue;
        };
        let Some(description) = node.description else {
            continue;
        };
        let group = Arc::new(CollectionViewGroup {
            description,
            name: node.name,
            level: node.level,
            is_bottom_level: node.is_bottom_level,
            path: node.path,
            groups: children,
            items: RwLock::new(node.items),
        });
        frozen.insert(key, group);
    }

    tracing::trace!(target: targets::GROUPING, groups = top_level.len(), "group tree built");
    (top_level, flattened)
}

fn find_child<R: Record>(
    arena: &SlotMap<NodeKey, NodeBuilder<R>>,
    parent: NodeKey,
    description: &dyn GroupDescription<R>,
    name: &Value,
) -> Option<NodeKey> {
    let parent = &arena[parent];
    if description.keyed_lookup() {
        if let Some(key) = name.primitive_key() {
            return parent.keyed_children.get(&key).copied();
        }
    }
    parent
        .children
        .iter()
        .copied()
        .find(|child| description.names_match(&arena[*child].name, name))
}

/// Debug rendering of a group tree.
#[derive(Debug, Clone, Default)]
pub struct GroupTreeDebug {
    options: TreeFormatOptions,
}

impl GroupTreeDebug {
    /// Create a renderer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a renderer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Render `groups` as an indented tree, one group per line.
    pub fn format<R: Record>(&self, groups: &[Arc<CollectionViewGroup<R>>]) -> String {
        let mut output = String::new();
        let mut ancestors = Vec::new();
        self.format_level(groups, &mut ancestors, &mut output);
        output
    }

    fn format_level<R: Record>(
        &self,
        groups: &[Arc<CollectionViewGroup<R>>],
        ancestors: &mut Vec<bool>,
        output: &mut String,
    ) {
        if self.options.max_depth.is_some_and(|max| ancestors.len() > max) {
            return;
        }
        for (i, group) in groups.iter().enumerate() {
            let is_last = i + 1 == groups.len();
            output.push_str(&self.options.prefix(ancestors, is_last));
            let _ = write!(output, "{}", group.name());
            if self.options.show_counts {
                let _ = write!(output, " ({})", group.item_count());
            }
            if self.options.show_paths {
                let _ = write!(output, " [{}]", group.path());
            }
            output.push('\n');

            ancestors.push(is_last);
            self.format_level(group.groups(), ancestors, output);
            ancestors.pop();
        }
    }
}
