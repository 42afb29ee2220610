use bujo_core::db::open_db_in_memory;
use bujo_core::{
    Bucket, ChangeKind, FixedClock, ItemChange, ItemRepository, ItemStore, ItemType,
    LocalFileItemRepository, SqliteItemRepository, TodayView,
};
use chrono::{NaiveDate, TimeDelta};
use std::sync::mpsc;
use std::sync::Arc;

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

type Row = (String, NaiveDate, bool, bool, Option<NaiveDate>, i64);

/// Runs a short journal session and returns the visible state by bucket.
fn journal_session<R: ItemRepository>(repo: R) -> Vec<(Bucket, Vec<Row>)> {
    let clock = Arc::new(FixedClock::on(day("2024-01-01")));
    let mut store = ItemStore::load(repo, clock.clone()).unwrap();

    let report = store.create("write report", ItemType::Task, day("2024-01-01")).unwrap();
    clock.advance(TimeDelta::minutes(1));
    store.create("standup", ItemType::Event, day("2024-01-01")).unwrap();
    clock.advance(TimeDelta::minutes(1));
    let groceries = store.create("groceries", ItemType::Task, day("2024-01-02")).unwrap();
    clock.advance(TimeDelta::minutes(1));
    let idea = store.create("garden idea", ItemType::Note, day("2024-01-09")).unwrap();
    store.toggle_complete(groceries.id).unwrap();

    clock.set_today(day("2024-01-03"));
    store.migrate_old_items().unwrap();
    let moved = store.create("call mom", ItemType::Task, day("2024-01-04")).unwrap();
    store.move_item(idea.id, day("2024-01-04")).unwrap();
    store
        .reorder_items(&[idea.id, moved.id], Bucket::Tomorrow)
        .unwrap();
    store.delete(report.id).ok();

    Bucket::ALL
        .into_iter()
        .map(|bucket| {
            let rows = store
                .get_items_by_category(bucket)
                .into_iter()
                .map(|item| {
                    (
                        item.content,
                        item.date,
                        item.completed,
                        item.migrated,
                        item.original_date,
                        item.order_index,
                    )
                })
                .collect();
            (bucket, rows)
        })
        .collect()
}

#[test]
fn both_backends_produce_the_same_journal() {
    let conn = open_db_in_memory().unwrap();
    let sqlite = journal_session(SqliteItemRepository::try_new(&conn).unwrap());

    let dir = tempfile::tempdir().unwrap();
    let local = journal_session(LocalFileItemRepository::in_dir(dir.path()));

    assert_eq!(sqlite, local);
    let today = &sqlite[0].1;
    assert_eq!(today.len(), 2);
    assert_eq!(today[0].0, "groceries");
    assert_eq!(today[1].0, "standup");
    assert!(today[0].2);
    assert!(!today[0].3, "completed tasks are not migrated");
    assert_eq!(today[0].1, day("2024-01-02"));

    let tomorrow = &sqlite[1].1;
    let names: Vec<&str> = tomorrow.iter().map(|row| row.0.as_str()).collect();
    assert_eq!(names, vec!["garden idea", "call mom"]);
}

#[test]
fn both_backends_persist_across_reloads() {
    let clock = Arc::new(FixedClock::on(day("2024-01-01")));

    let dir = tempfile::tempdir().unwrap();
    let repo = LocalFileItemRepository::in_dir(dir.path());
    let mut store = ItemStore::load(repo.clone(), clock.clone()).unwrap();
    let task = store.create("water plants", ItemType::Task, day("2024-01-01")).unwrap();
    clock.set_today(day("2024-01-02"));
    store.migrate_old_items().unwrap();
    let expected = store.items().to_vec();
    drop(store);

    let reloaded = ItemStore::load(repo, clock.clone()).unwrap();
    assert_eq!(reloaded.items(), expected.as_slice());
    assert_eq!(
        reloaded.get(task.id).unwrap().original_date,
        Some(day("2024-01-01"))
    );

    let conn = open_db_in_memory().unwrap();
    let mut store =
        ItemStore::load(SqliteItemRepository::try_new(&conn).unwrap(), clock.clone()).unwrap();
    store.create("stretch", ItemType::Task, day("2024-01-02")).unwrap();
    let expected = store.items().to_vec();
    drop(store);

    let reloaded =
        ItemStore::load(SqliteItemRepository::try_new(&conn).unwrap(), clock).unwrap();
    assert_eq!(reloaded.items(), expected.as_slice());
}

#[test]
fn sqlite_backend_pushes_committed_changes() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::on(day("2024-01-10")));
    let mut store =
        ItemStore::load(SqliteItemRepository::try_new(&conn).unwrap(), clock.clone()).unwrap();

    let (sender, receiver) = mpsc::channel::<ItemChange>();
    let subscribed = store
        .repository()
        .subscribe(Box::new(move |change: &ItemChange| {
            let _ = sender.send(*change);
        }))
        .unwrap();
    assert!(subscribed);

    let a = store.create("a", ItemType::Task, day("2024-01-10")).unwrap();
    let b = store.create("b", ItemType::Task, day("2024-01-10")).unwrap();
    store.reorder_items(&[b.id, a.id], Bucket::Today).unwrap();
    store.delete(a.id).unwrap();

    let changes: Vec<ItemChange> = receiver.try_iter().collect();
    let kinds: Vec<(ChangeKind, _)> = changes
        .iter()
        .map(|change| (change.kind, change.item_id))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ChangeKind::Inserted, a.id),
            (ChangeKind::Inserted, b.id),
            (ChangeKind::Updated, b.id),
            (ChangeKind::Updated, a.id),
            (ChangeKind::Removed, a.id),
        ]
    );
}

#[test]
fn local_file_backend_reports_no_push_support() {
    let dir = tempfile::tempdir().unwrap();
    let repo = LocalFileItemRepository::in_dir(dir.path());
    assert!(!repo.subscribe(Box::new(|_: &ItemChange| {})).unwrap());
}

#[test]
fn refresh_picks_up_writes_from_another_handle() {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::on(day("2024-01-10")));
    let mut viewer =
        ItemStore::load(SqliteItemRepository::try_new(&conn).unwrap(), clock.clone()).unwrap();
    let mut writer =
        ItemStore::load(SqliteItemRepository::try_new(&conn).unwrap(), clock.clone()).unwrap();

    let item = writer.create("sync me", ItemType::Note, day("2024-01-11")).unwrap();
    assert!(viewer.is_empty());

    viewer.refresh().unwrap();
    assert_eq!(viewer.get(item.id), Some(&item));
    assert_eq!(viewer.bucket_counts(TodayView::Strict).tomorrow, 1);
}
