//! Integration tests for collection views.

use std::sync::Arc;

use horizon_collections::{
    get_aggregate, shared, Aggregate, CollectionChangedAction, CollectionError, CollectionView,
    CollectionViewCapabilities, CollectionViewGroup, DataRecord, ItemCollectionView, ObservableArray,
    PropertyGroupDescription, SharedItem, SortDescription, Value,
};
use parking_lot::Mutex;

type Events = Arc<Mutex<Vec<(CollectionChangedAction, Option<usize>)>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rec(a: i64, g: &str) -> DataRecord {
    DataRecord::new().with("a", a).with("g", g)
}

fn numbers(n: i64) -> Vec<DataRecord> {
    (0..n).map(|i| DataRecord::new().with("a", i)).collect()
}

fn column(items: &[SharedItem<DataRecord>], field: &str) -> Vec<Value> {
    items
        .iter()
        .map(|item| item.read().get(field).cloned().unwrap_or_default())
        .collect()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

fn record_events(view: &CollectionView<DataRecord>) -> Events {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    view.collection_changed().add_handler(move |_, args| {
        events_clone.lock().push((args.action, args.index));
    });
    events
}

fn same_items(a: &[SharedItem<DataRecord>], b: &[SharedItem<DataRecord>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

fn by(property: &str) -> Arc<PropertyGroupDescription<DataRecord>> {
    Arc::new(PropertyGroupDescription::new(property))
}

#[test]
fn test_refresh_is_idempotent() {
    init_tracing();
    let view = CollectionView::builder()
        .items(vec![rec(3, "y"), rec(1, "x"), rec(2, "x")])
        .sort_by("a", true)
        .group_by("g")
        .build();
    view.move_current_to_last();

    let items = view.items();
    let groups = view.groups();
    let current = view.current_item();

    view.refresh();
    view.refresh();

    assert!(same_items(&items, &view.items()));
    assert_eq!(groups.len(), view.groups().len());
    for (before, after) in groups.iter().zip(view.groups()) {
        assert_eq!(before.path(), after.path());
        assert!(same_items(&before.items(), &after.items()));
    }
    assert!(Arc::ptr_eq(&current.unwrap(), &view.current_item().unwrap()));
}

#[test]
fn test_stable_sort_keeps_source_order_for_ties() {
    let source: Vec<DataRecord> = (0..40)
        .map(|i| DataRecord::new().with("key", i % 3).with("seq", i))
        .collect();
    let view = CollectionView::builder()
        .items(source)
        .sort_by("key", true)
        .stable_sort(true)
        .build();

    let items = view.items();
    for pair in items.windows(2) {
        let (a, b) = (pair[0].read(), pair[1].read());
        if a.get("key") == b.get("key") {
            assert!(a.get("seq").and_then(Value::as_i64) < b.get("seq").and_then(Value::as_i64));
        }
    }
}

#[test]
fn test_nulls_sort_last_in_both_directions() {
    let source = vec![
        DataRecord::new().with("a", 2),
        DataRecord::new(),
        DataRecord::new().with("a", 1),
        DataRecord::new().with("a", Value::Float(f64::NAN)),
        DataRecord::new().with("a", 3),
    ];
    let view = CollectionView::builder().items(source).sort_by("a", true).build();
    let values = column(&view.items(), "a");
    assert_eq!(&values[..3], &ints(&[1, 2, 3])[..]);
    assert!(values[3..].iter().all(|v| v.is_null() || v.is_nan()));

    view.sort_descriptions().set_at(0, SortDescription::descending("a"));
    let values = column(&view.items(), "a");
    assert_eq!(&values[..3], &ints(&[3, 2, 1])[..]);
    assert!(values[3..].iter().all(|v| v.is_null() || v.is_nan()));
}

#[test]
fn test_filter_closure() {
    let view = CollectionView::from_items(numbers(10));
    let even = |record: &DataRecord| record.get("a").and_then(Value::as_i64).unwrap_or(0) % 2 == 0;
    view.set_filter(even);

    let items = view.items();
    assert_eq!(column(&items, "a"), ints(&[0, 2, 4, 6, 8]));
    for item in view.source_collection().unwrap().to_vec() {
        assert_eq!(view.contains(&item), even(&*item.read()));
    }

    view.set_can_filter(false);
    assert_eq!(view.item_count(), 10);
    view.set_can_filter(true);
    view.clear_filter();
    assert_eq!(view.item_count(), 10);
}

#[test]
fn test_paging_partitions_the_view() {
    let view = CollectionView::builder()
        .items(numbers(11))
        .sort_by("a", false)
        .group_by("a")
        .page_size(3)
        .build();
    assert_eq!(view.page_count(), 4);

    let mut seen = Vec::new();
    for page in 0..view.page_count() {
        assert!(view.move_to_page(page));
        seen.extend(view.items());
    }
    assert_eq!(seen.len(), view.total_item_count());
    assert_eq!(column(&seen, "a"), ints(&[10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0]));
}

fn check_conservation(group: &CollectionViewGroup<DataRecord>) {
    if group.is_bottom_level() {
        assert!(group.groups().is_empty());
    } else {
        let children: usize = group.groups().iter().map(|g| g.item_count()).sum();
        assert_eq!(group.item_count(), children);
        for child in group.groups() {
            check_conservation(child);
        }
    }
}

#[test]
fn test_group_item_counts_are_conserved() {
    let source: Vec<DataRecord> = (0..30)
        .map(|i| {
            DataRecord::new()
                .with("region", ["north", "south", "east"][i % 3])
                .with("tier", i % 4)
                .with("size", i % 2 == 0)
        })
        .collect();
    let view = CollectionView::builder()
        .items(source)
        .group_by("region")
        .group_by("tier")
        .group_by("size")
        .build();

    let groups = view.groups();
    assert_eq!(groups.iter().map(|g| g.item_count()).sum::<usize>(), 30);
    for group in &groups {
        check_conservation(group);
    }
}

#[test]
fn test_transactions_are_exclusive() {
    let view = CollectionView::from_items(numbers(3));

    let new_item = view.add_new().unwrap();
    assert!(view.is_adding_new());
    assert!(!view.is_editing_item());
    assert!(Arc::ptr_eq(&view.current_item().unwrap(), &new_item));

    let existing = view.items()[0].clone();
    assert!(view.edit_item(&existing));
    assert!(view.is_editing_item());
    assert!(!view.is_adding_new());

    view.commit_edit();
    assert!(!view.is_editing_item());
    assert_eq!(view.total_item_count(), 4);

    // Re-entering the same edit is a no-op.
    assert!(view.edit_item(&existing));
    existing.write().insert("a", 100);
    assert!(view.edit_item(&existing));
    view.cancel_edit().unwrap();
    assert_eq!(existing.read().get("a"), Some(&Value::from(0)));
}

#[test]
fn test_change_tracking_ledgers() {
    let view = CollectionView::builder().items(numbers(4)).track_changes(true).build();
    let items = view.items();

    // Edit then remove: ends up removed only.
    assert!(view.edit_item(&items[0]));
    items[0].write().insert("a", 10);
    view.commit_edit();
    assert!(view.items_edited().contains(&items[0]));
    view.remove(&items[0]).unwrap();
    assert!(!view.items_edited().contains(&items[0]));
    assert!(view.items_removed().contains(&items[0]));

    // Add then edit: stays added only.
    let added = view.add_new().unwrap();
    view.commit_new();
    assert!(view.items_added().contains(&added));
    assert!(view.edit_item(&added));
    added.write().insert("a", 99);
    view.commit_edit();
    assert!(!view.items_edited().contains(&added));

    // Add then remove: disappears from every ledger.
    view.remove(&added).unwrap();
    assert!(!view.items_added().contains(&added));
    assert!(!view.items_removed().contains(&added));

    // An edit that changes nothing is not recorded.
    assert!(view.edit_item(&items[1]));
    view.commit_edit();
    assert!(!view.items_edited().contains(&items[1]));

    // Uncommitted new items are never recorded as removed.
    let pending = view.add_new().unwrap();
    view.cancel_new().unwrap();
    assert!(!view.items_removed().contains(&pending));

    for item in view.source_collection().unwrap().to_vec().iter().chain(&items) {
        let ledgers = [view.items_added(), view.items_edited(), view.items_removed()];
        assert!(ledgers.iter().filter(|l| l.contains(item)).count() <= 1);
    }

    view.clear_changes();
    assert!(view.items_removed().is_empty());
}

#[test]
fn test_enabling_tracking_clears_ledgers() {
    let view = CollectionView::builder().items(numbers(2)).track_changes(true).build();
    let item = view.items()[0].clone();
    view.remove(&item).unwrap();
    assert_eq!(view.items_removed().len(), 1);

    view.set_track_changes(false);
    view.set_track_changes(true);
    assert!(view.items_removed().is_empty());
}

#[test]
fn test_aggregate_contract() {
    let values = |xs: &[Option<i64>]| xs.iter().map(|x| Value::from(*x)).collect::<Vec<_>>();
    assert_eq!(get_aggregate(Aggregate::Sum, &values(&[Some(1), Some(2), Some(3)]), None), Ok(Value::from(6)));
    assert_eq!(get_aggregate(Aggregate::Avg, &values(&[Some(2), Some(4)]), None), Ok(Value::from(3)));
    assert_eq!(get_aggregate(Aggregate::CntAll, &values(&[Some(1), None, Some(2)]), None), Ok(Value::from(3)));
    assert_eq!(get_aggregate(Aggregate::Cnt, &values(&[Some(1), None, Some(2)]), None), Ok(Value::from(2)));
    assert_eq!(get_aggregate(Aggregate::VarPop, &values(&[Some(2), Some(2), Some(2)]), None), Ok(Value::from(0)));
}

#[test]
fn test_sort_then_group_scenario() {
    let view = CollectionView::builder()
        .items(vec![rec(1, "x"), rec(3, "y"), rec(2, "x")])
        .sort_by("a", true)
        .group_by("g")
        .build();

    let groups = view.groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].name(), &Value::from("x"));
    assert_eq!(groups[1].name(), &Value::from("y"));
    assert_eq!(column(&groups[0].items(), "a"), ints(&[1, 2]));
    assert_eq!(column(&view.items(), "a"), ints(&[1, 2, 3]));
}

#[test]
fn test_page_clamping_scenario() {
    let view = CollectionView::builder().items(numbers(5)).sort_by("a", true).page_size(2).build();
    assert_eq!(view.page_count(), 3);
    assert_eq!(view.item_count(), 2);

    let requested = Arc::new(Mutex::new(Vec::new()));
    let requested_clone = requested.clone();
    view.page_changing().add_handler(move |_, args| {
        requested_clone.lock().push(args.new_page_index());
    });

    assert!(!view.move_to_page(5));
    assert_eq!(view.page_index(), 2);
    assert_eq!(view.item_count(), 1);
    assert_eq!(*requested.lock(), vec![2]);
    assert_eq!(view.current_position(), Some(0));
}

#[test]
fn test_add_then_cancel_restores_items() {
    let view = CollectionView::from_items(numbers(3));
    let before = view.items();

    view.add_new().unwrap();
    assert_eq!(view.item_count(), 4);
    view.cancel_new().unwrap();

    assert!(!view.is_adding_new());
    assert!(same_items(&before, &view.items()));
    assert_eq!(view.source_collection().unwrap().len(), 3);
}

#[test]
fn test_add_new_joins_last_group() {
    let view = CollectionView::builder()
        .items(vec![rec(1, "x"), rec(3, "y"), rec(2, "x")])
        .group_by("g")
        .build();
    let events = record_events(&view);

    let item = view.add_new().unwrap();
    let groups = view.groups();
    assert_eq!(groups[1].item_count(), 2);
    assert!(Arc::ptr_eq(&groups[1].items()[1], &item));
    assert_eq!(view.current_position(), Some(3));
    assert_eq!(events.lock()[0], (CollectionChangedAction::Add, Some(3)));

    // Committing moves the blank record into its own group.
    view.commit_new();
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Reset, None)));
    assert_eq!(view.groups().len(), 3);
}

#[test]
fn test_commit_new_in_place_reports_change() {
    let view = CollectionView::from_items(numbers(3));
    let events = record_events(&view);

    let item = view.add_new().unwrap();
    item.write().insert("a", 9);
    view.commit_new();

    assert_eq!(
        *events.lock(),
        vec![
            (CollectionChangedAction::Add, Some(3)),
            (CollectionChangedAction::Change, Some(3)),
        ]
    );
    assert_eq!(view.index_of(&item), Some(3));
}

#[test]
fn test_add_new_on_a_full_page() {
    let view = CollectionView::builder().items(numbers(5)).page_size(2).build();
    let events = record_events(&view);

    let item = view.add_new().unwrap();
    assert_eq!(view.item_count(), 3);
    assert_eq!(view.index_of(&item), Some(2));
    assert_eq!(view.current_position(), Some(2));
    assert_eq!(view.total_item_count(), 6);

    view.commit_new();
    assert_eq!(
        *events.lock(),
        vec![
            (CollectionChangedAction::Add, Some(2)),
            (CollectionChangedAction::Reset, None),
        ]
    );
    assert_eq!(view.item_count(), 2);
    assert!(!view.contains(&item));
    assert_eq!(view.page_count(), 3);

    assert!(view.move_to_last_page());
    assert_eq!(view.index_of(&item), Some(1));
}

#[test]
fn test_add_new_uses_creator() {
    let view = CollectionView::builder()
        .items(numbers(2))
        .new_item_creator(|| DataRecord::new().with("a", -1))
        .sort_by("a", true)
        .build();
    let item = view.add_new().unwrap();
    assert_eq!(view.index_of(&item), Some(2));
    view.commit_new();
    assert_eq!(view.index_of(&item), Some(0));
}

#[test]
fn test_add_new_item_with_explicit_record() {
    let view = CollectionView::from_items(numbers(1));
    let item = view.add_new_item(DataRecord::new().with("a", 42)).unwrap();
    view.commit_new();
    assert_eq!(item.read().get("a"), Some(&Value::from(42)));
    assert_eq!(view.total_item_count(), 2);
}

#[test]
fn test_commit_edit_reports_change_or_reset() {
    let view = CollectionView::from_items(numbers(3));
    let events = record_events(&view);
    let item = view.items()[1].clone();

    view.edit_item(&item);
    item.write().insert("name", "renamed");
    view.commit_edit();
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Change, Some(1))));

    view.sort_descriptions().push(SortDescription::ascending("a"));
    view.edit_item(&item);
    item.write().insert("a", 50);
    view.commit_edit();
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Reset, None)));
    assert_eq!(view.index_of(&item), Some(2));
}

#[test]
fn test_cancel_edit_restores_snapshot() {
    let view = CollectionView::builder().items(numbers(2)).track_changes(true).build();
    let events = record_events(&view);
    let item = view.items()[1].clone();

    view.edit_item(&item);
    item.write().insert("a", 7);
    item.write().insert("extra", true);
    view.cancel_edit().unwrap();

    assert_eq!(item.read().get("a"), Some(&Value::from(1)));
    assert!(!view.is_editing_item());
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Change, Some(1))));
    assert!(view.items_edited().is_empty());
}

#[test]
fn test_capability_violations_leave_view_unchanged() {
    let view = CollectionView::builder()
        .items(numbers(3))
        .capabilities(CollectionViewCapabilities::read_only())
        .build();
    let events = record_events(&view);

    assert!(matches!(view.add_new(), Err(CollectionError::CannotAddNew)));
    let item = view.items()[0].clone();
    assert_eq!(view.remove(&item), Err(CollectionError::CannotRemove));
    assert_eq!(view.remove_at(0), Err(CollectionError::CannotRemove));

    view.edit_item(&item);
    item.write().insert("a", 9);
    assert_eq!(view.cancel_edit(), Err(CollectionError::CannotCancelEdit));
    assert!(view.is_editing_item());
    view.commit_edit();

    assert_eq!(view.total_item_count(), 3);
    assert!(events.lock().iter().all(|(action, _)| *action != CollectionChangedAction::Add));
}

#[test]
fn test_detached_view_cannot_add() {
    let view = CollectionView::<DataRecord>::builder().detached().build();
    assert!(matches!(view.add_new(), Err(CollectionError::NoSourceCollection)));
}

#[test]
fn test_remove_notifications() {
    let view = CollectionView::from_items(numbers(4));
    let events = record_events(&view);

    assert!(view.remove_at(1).unwrap());
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Remove, Some(1))));
    assert_eq!(column(&view.items(), "a"), ints(&[0, 2, 3]));

    view.sort_descriptions().push(SortDescription::descending("a"));
    assert!(view.remove_at(0).unwrap());
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Reset, None)));
    assert_eq!(column(&view.items(), "a"), ints(&[2, 0]));

    let stranger = shared(DataRecord::new());
    assert!(!view.remove(&stranger).unwrap());
    assert!(!view.remove_at(10).unwrap());
}

#[test]
fn test_remove_while_editing_rolls_back() {
    let view = CollectionView::from_items(numbers(2));
    let item = view.items()[0].clone();
    view.edit_item(&item);
    item.write().insert("a", 5);
    view.remove(&item).unwrap();
    assert!(!view.is_editing_item());
    assert_eq!(item.read().get("a"), Some(&Value::from(0)));
    assert_eq!(view.total_item_count(), 1);
}

#[test]
fn test_current_changing_can_veto() {
    let view = CollectionView::from_items(numbers(3));
    let veto = view.current_changing().add_handler(|_, args| args.cancel());

    assert!(!view.move_current_to_position(Some(2)));
    assert_eq!(view.current_position(), Some(0));

    view.current_changing().remove_handler(Some(veto), None);
    assert!(view.move_current_to_position(Some(2)));
    assert!(!view.move_current_to_position(Some(3)));
    assert_eq!(view.current_position(), Some(2));
}

#[test]
fn test_current_changed_is_raised_once_per_move() {
    let view = CollectionView::from_items(numbers(3));
    let count = Arc::new(Mutex::new(0));
    let count_clone = count.clone();
    view.current_changed().add_handler(move |_, _| *count_clone.lock() += 1);

    view.move_current_to_next();
    view.move_current_to_next();
    view.move_current_to_position(Some(2));
    assert_eq!(*count.lock(), 2);
}

#[test]
fn test_previous_at_first_item_keeps_cursor() {
    let view = CollectionView::from_items(numbers(5));
    assert!(view.move_current_to_first());

    assert!(!view.move_current_to_previous());
    assert_eq!(view.current_position(), Some(0));
    assert!(view.current_item().is_some());

    assert!(!view.move_current_to_position(None));
    assert_eq!(view.current_position(), Some(0));
}

#[test]
fn test_cursor_follows_item_across_refresh() {
    let view = CollectionView::from_items(numbers(5));
    let item = view.items()[3].clone();
    assert!(view.move_current_to(&item));

    view.sort_descriptions().push(SortDescription::descending("a"));
    assert_eq!(view.current_position(), Some(1));
    assert!(Arc::ptr_eq(&view.current_item().unwrap(), &item));

    // Filtering the current item out falls back to the old position.
    view.set_filter(|r| r.get("a") != Some(&Value::from(3)));
    assert_eq!(view.current_position(), Some(1));
}

#[test]
fn test_page_change_can_be_vetoed() {
    let view = CollectionView::builder().items(numbers(5)).page_size(2).build();
    let changed = Arc::new(Mutex::new(0));
    let changed_clone = changed.clone();
    view.page_changed().add_handler(move |_, _| *changed_clone.lock() += 1);
    let veto = view.page_changing().add_handler(|_, args| args.cancel());

    assert!(!view.move_to_next_page());
    assert_eq!(view.page_index(), 0);
    assert_eq!(*changed.lock(), 0);

    view.page_changing().remove_handler(Some(veto), None);
    assert!(view.move_to_next_page());
    assert_eq!(column(&view.items(), "a"), ints(&[2, 3]));
    assert_eq!(*changed.lock(), 1);

    view.set_can_change_page(false);
    assert!(!view.move_to_next_page());
    assert_eq!(view.page_index(), 1);
}

#[test]
fn test_group_aggregates_ignore_paging() {
    let source: Vec<DataRecord> = (1..=6).map(|i| rec(i, if i <= 4 { "x" } else { "y" })).collect();
    let view = CollectionView::builder().items(source).group_by("g").page_size(3).build();

    let page_group = view.groups()[0].clone();
    assert_eq!(page_group.item_count(), 3);
    assert_eq!(
        page_group.get_aggregate(Aggregate::Sum, Some("a"), None).unwrap(),
        Value::from(6)
    );
    assert_eq!(
        page_group.get_aggregate(Aggregate::Sum, Some("a"), Some(&*view as &dyn ItemCollectionView<_>)).unwrap(),
        Value::from(10)
    );
    assert_eq!(view.get_aggregate(Aggregate::Cnt, Some("a")).unwrap(), Value::from(6));
}

#[test]
fn test_source_changes_refresh_the_view() {
    let source = Arc::new(ObservableArray::from_vec(
        numbers(2).into_iter().map(shared).collect(),
    ));
    let view = CollectionView::new(source.clone());
    let events = record_events(&view);

    source.push(shared(DataRecord::new().with("a", 9)));
    assert_eq!(view.item_count(), 3);
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Reset, None)));

    source.begin_update();
    source.push(shared(DataRecord::new()));
    source.push(shared(DataRecord::new()));
    source.end_update();
    assert_eq!(view.item_count(), 5);
    assert_eq!(events.lock().len(), 2);
}

#[test]
fn test_view_update_scope_coalesces_refreshes() {
    let view = CollectionView::from_items(numbers(3));
    let events = record_events(&view);

    view.defer_update(|| {
        view.sort_descriptions().push(SortDescription::descending("a"));
        view.group_descriptions().push(by("a"));
        view.set_page_size(2);
        assert!(view.is_updating());
    });

    assert!(!view.is_updating());
    assert_eq!(events.lock().len(), 1);
    assert_eq!(column(&view.items(), "a"), ints(&[2, 1]));
}

#[test]
fn test_unmatched_end_update_does_not_refresh() {
    let view = CollectionView::from_items(numbers(3));
    let events = record_events(&view);

    view.end_update();
    assert!(events.lock().is_empty());
    assert!(!view.is_updating());

    view.begin_update();
    view.end_update();
    assert_eq!(*events.lock(), vec![(CollectionChangedAction::Reset, None)]);
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_grouping_is_traced_in_its_own_span() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        CollectionView::builder()
            .items(vec![rec(1, "x"), rec(2, "y")])
            .group_by("g")
            .build();
    });

    let output = String::from_utf8(logs.0.lock().clone()).unwrap();
    assert!(output.contains("building groups"));
    assert!(output.contains(r#"operation="horizon_collections::grouping""#));
}

#[test]
fn test_replacing_the_source() {
    let view = CollectionView::builder().items(numbers(3)).track_changes(true).build();
    let old = view.source_collection().unwrap();
    view.remove_at(0).unwrap();
    assert_eq!(view.items_removed().len(), 1);

    let veto = view.source_collection_changing().add_handler(|_, args| args.cancel());
    let replacement = Arc::new(ObservableArray::from_vec(vec![shared(DataRecord::new().with("a", 7))]));
    assert!(!view.set_source_collection(Some(replacement.clone())));
    assert_eq!(view.item_count(), 2);

    view.source_collection_changing().remove_handler(Some(veto), None);
    assert!(view.set_source_collection(Some(replacement)));
    assert_eq!(column(&view.items(), "a"), ints(&[7]));
    assert_eq!(view.current_position(), Some(0));
    assert!(view.items_removed().is_empty());
    assert_eq!(old.collection_changed().handler_count(), 0);

    old.push(shared(DataRecord::new()));
    assert_eq!(view.item_count(), 1);
}

#[test]
fn test_dropping_the_view_unsubscribes() {
    let source: Arc<ObservableArray<SharedItem<DataRecord>>> = Arc::new(ObservableArray::new());
    let view = CollectionView::new(source.clone());
    assert_eq!(source.collection_changed().handler_count(), 1);
    drop(view);
    assert_eq!(source.collection_changed().handler_count(), 0);
    source.push(shared(DataRecord::new()));
}

#[test]
fn test_notify_item_changed_tracks_edits() {
    let view = CollectionView::builder().items(numbers(2)).track_changes(true).build();
    let events = record_events(&view);
    let item = view.items()[1].clone();

    item.write().insert("a", 40);
    assert!(view.notify_item_changed(&item));
    assert_eq!(events.lock().last(), Some(&(CollectionChangedAction::Change, Some(1))));
    assert!(view.items_edited().contains(&item));

    assert!(!view.notify_item_changed(&shared(DataRecord::new())));
}

#[test]
fn test_disabling_grouping_and_sorting() {
    let view = CollectionView::builder()
        .items(vec![rec(2, "y"), rec(1, "x")])
        .sort_by("a", true)
        .group_by("g")
        .build();
    assert_eq!(view.groups().len(), 2);

    view.set_can_group(false);
    assert!(view.groups().is_empty());
    assert_eq!(column(&view.items(), "a"), ints(&[1, 2]));

    view.set_can_sort(false);
    assert_eq!(column(&view.items(), "a"), ints(&[2, 1]));
}

#[test]
fn test_sort_hooks() {
    let view = CollectionView::builder()
        .items(["pear", "fig", "banana"].into_iter().map(|s| DataRecord::new().with("name", s)))
        .sort_by("name", true)
        .sort_converter(|_, _, value, _| match value {
            Value::String(s) => Value::from(s.len()),
            other => other,
        })
        .build();
    assert_eq!(
        column(&view.items(), "name"),
        vec![Value::from("fig"), Value::from("pear"), Value::from("banana")]
    );

    view.set_sort_converter(None);
    view.set_sort_comparer(Some(Arc::new(|a: &Value, b: &Value| {
        Some(b.as_str()?.cmp(a.as_str()?))
    })));
    assert_eq!(
        column(&view.items(), "name"),
        vec![Value::from("pear"), Value::from("fig"), Value::from("banana")]
    );
}

#[test]
fn test_empty_view() {
    let view = CollectionView::<DataRecord>::empty();
    assert!(view.is_empty());
    assert_eq!(view.page_count(), 1);
    assert_eq!(view.current_item().map(|_| ()), None);
    assert!(!view.move_current_to_first());
    assert!(view.move_current_to_last());
    assert!(!view.move_current_to_previous());
    assert_eq!(view.get_aggregate(Aggregate::Sum, Some("a")).unwrap(), Value::from(0));
}
