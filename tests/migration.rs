use s3_migrate::{
    AccessLevel, MigrationError, MigrationJob, MigrationOptions, MigrationSummary, Migrator,
    ProgressReporter, RetryPolicy, StoreError, Tier,
    services::{
        memory_store::{FailAt, MemoryStore, StoredObject},
        progress::SharedWriter,
    },
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

fn stores() -> (MemoryStore, MemoryStore) {
    let source = MemoryStore::new("source");
    source.create_bucket("old");
    let destination = MemoryStore::new("destination");
    destination.create_bucket("new");
    (source, destination)
}

fn job(source: &MemoryStore, destination: &MemoryStore) -> MigrationJob {
    MigrationJob::new(
        Arc::new(source.clone()),
        "old",
        Arc::new(destination.clone()),
        "new",
    )
}

fn options(workers: usize, page_size: usize) -> MigrationOptions {
    MigrationOptions {
        workers,
        page_size,
        retry: RetryPolicy::default(),
    }
}

async fn migrate(
    job: &MigrationJob,
    options: MigrationOptions,
) -> Result<MigrationSummary, MigrationError> {
    Migrator::new(options, ProgressReporter::disabled())
        .run(job)
        .await
}

fn fill(store: &MemoryStore, count: usize) {
    for i in 0..count {
        let key = format!("photos/{i:04}.jpg");
        store.insert("old", &key, StoredObject::new(key.clone().into_bytes()));
    }
}

#[tokio::test]
async fn copies_every_object_with_its_tier() {
    let (source, destination) = stores();
    source.insert("old", "a", StoredObject::new("alpha"));
    source.insert(
        "old",
        "b",
        StoredObject::new("bravo").with_tier(Tier::Archive),
    );
    source.insert("old", "c", StoredObject::new("charlie"));

    let summary = migrate(&job(&source, &destination), options(4, 32))
        .await
        .unwrap();

    assert_eq!(summary.listed, 3);
    assert_eq!(summary.listed_bytes, 17);
    assert_eq!(summary.copied, 3);
    assert_eq!(summary.pages, 1);
    assert!(summary.abandoned.is_empty());

    let copied = destination.snapshot("new");
    assert_eq!(copied.keys().map(String::as_str).collect::<Vec<_>>(), ["a", "b", "c"]);
    assert_eq!(copied["a"].tier, Tier::Standard);
    assert_eq!(copied["b"].tier, Tier::Archive);
    assert_eq!(copied["c"].data, "charlie");
}

#[tokio::test]
async fn keeps_access_level_content_type_and_metadata() {
    let (source, destination) = stores();
    source.insert(
        "old",
        "public/logo.png",
        StoredObject::new(vec![0u8; 20_000])
            .with_tier(Tier::InfrequentAccess)
            .with_content_type("image/png")
            .with_metadata("owner", "design")
            .with_access(AccessLevel::PublicRead),
    );
    source.insert(
        "old",
        "private/notes.txt",
        StoredObject::new("secret").with_content_type("text/plain"),
    );

    migrate(&job(&source, &destination), options(2, 32))
        .await
        .unwrap();

    assert_eq!(destination.snapshot("new"), source.snapshot("old"));
    let logo = destination.object("new", "public/logo.png").unwrap();
    assert_eq!(logo.access, AccessLevel::PublicRead);
    assert_eq!(logo.user_metadata.get("owner").map(String::as_str), Some("design"));
}

#[tokio::test]
async fn walks_every_page_exactly_once() {
    let (source, destination) = stores();
    fill(&source, 100);

    let summary = migrate(&job(&source, &destination), options(3, 7))
        .await
        .unwrap();

    assert_eq!(summary.listed, 100);
    assert_eq!(summary.copied, 100);
    assert_eq!(summary.pages, 15);
    assert_eq!(source.list_calls(), 15);
    assert_eq!(destination.keys("new"), source.keys("old"));
    for key in source.keys("old") {
        assert_eq!(destination.write_count(&key), 1, "{key}");
    }
}

#[tokio::test]
async fn empty_bucket_finishes_with_nothing_copied() {
    let (source, destination) = stores();

    let summary = migrate(&job(&source, &destination), options(2, 32))
        .await
        .unwrap();

    assert_eq!(summary.listed, 0);
    assert_eq!(summary.copied, 0);
    assert!(destination.keys("new").is_empty());
}

#[tokio::test]
async fn running_twice_leaves_the_same_destination() {
    let (source, destination) = stores();
    fill(&source, 10);
    destination.insert("new", "photos/0003.jpg", StoredObject::new("stale"));
    destination.insert("new", "unrelated", StoredObject::new("kept"));

    let job = job(&source, &destination);
    migrate(&job, options(4, 4)).await.unwrap();
    let first = destination.snapshot("new");
    let second_summary = migrate(&job, options(4, 4)).await.unwrap();

    assert_eq!(second_summary.copied, 10);
    assert_eq!(destination.snapshot("new"), first);
    assert_eq!(first["photos/0003.jpg"].data, "photos/0003.jpg");
    assert_eq!(first["unrelated"].data, "kept");
    assert_eq!(destination.write_count("photos/0007.jpg"), 2);
}

#[tokio::test(start_paused = true)]
async fn flaky_object_is_written_once_and_counted_once() {
    let (source, destination) = stores();
    source.insert("old", "steady", StoredObject::new("ok"));
    source.insert("old", "x", StoredObject::new("eventually"));
    source.fail_next(FailAt::Get, "x", 1);
    destination.fail_next(FailAt::Put, "x", 1);

    let started = tokio::time::Instant::now();
    let summary = migrate(&job(&source, &destination), options(2, 32))
        .await
        .unwrap();

    assert_eq!(summary.copied, 2);
    assert_eq!(destination.write_count("x"), 1);
    assert_eq!(destination.object("new", "x").unwrap().data, "eventually");
    assert!(started.elapsed() >= Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn backoff_only_holds_up_the_failing_object() {
    let (source, _) = stores();
    for i in 0..6 {
        source.insert("old", &format!("k{i}"), StoredObject::new(format!("value {i}")));
    }
    source.fail_next(FailAt::Get, "k0", 3);
    let destination = MemoryStore::new("slow").with_put_latency(Duration::from_millis(10));
    destination.create_bucket("new");

    let job = job(&source, &destination);
    let run = tokio::spawn(async move { migrate(&job, options(2, 32)).await });

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(destination.keys("new"), ["k1", "k2", "k3", "k4", "k5"]);
    assert!(!run.is_finished());

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.copied, 6);
    assert_eq!(destination.write_count("k0"), 1);
}

#[tokio::test(start_paused = true)]
async fn progress_line_collects_then_copies_then_clears() {
    let (source, destination) = stores();
    for key in ["a", "b", "c"] {
        source.insert("old", key, StoredObject::new(key));
    }
    let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
    let writer: SharedWriter = buffer.clone();

    let summary = Migrator::new(options(2, 32), ProgressReporter::with_writer(writer))
        .run(&job(&source, &destination))
        .await
        .unwrap();
    assert_eq!(summary.copied, 3);

    let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    let collecting = out.find("Collecting files...").expect("collecting label drawn");
    let copying = out.find("Copying files (").expect("copying label drawn");
    assert!(collecting < copying);
    assert!(out.contains(" done so far)"));
    assert!(out.ends_with(" \r"), "line not erased: {out:?}");
    let last_frame = out.trim_end_matches([' ', '\r']).rsplit('\r').next().unwrap();
    assert!(last_frame.starts_with(['|', '/', '-', '\\']), "{out:?}");
}

#[tokio::test(start_paused = true)]
async fn never_exceeds_the_worker_limit() {
    let (source, _) = stores();
    fill(&source, 40);
    let destination = MemoryStore::new("slow").with_put_latency(Duration::from_millis(25));
    destination.create_bucket("new");

    let summary = migrate(&job(&source, &destination), options(4, 16))
        .await
        .unwrap();

    assert_eq!(summary.copied, 40);
    let peak = destination.peak_concurrent_writes();
    assert!(peak <= 4, "peak {peak}");
    assert!(peak >= 2, "peak {peak}");
}

#[tokio::test]
async fn listing_failure_ends_the_job() {
    let (source, destination) = stores();
    fill(&source, 5);
    source.fail_next_listings(1);

    let err = migrate(&job(&source, &destination), options(2, 32))
        .await
        .unwrap_err();

    match err {
        MigrationError::Listing { bucket, marker, source } => {
            assert_eq!(bucket, "old");
            assert_eq!(marker, None);
            assert!(matches!(source, StoreError::Injected(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(destination.keys("new").is_empty());
}

#[tokio::test]
async fn missing_source_bucket_is_reported() {
    let source = MemoryStore::new("source");
    let (_, destination) = stores();

    let err = migrate(&job(&source, &destination), options(2, 32))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MigrationError::Listing { source: StoreError::Service { ref code, .. }, .. }
            if code == "NoSuchBucket"
    ));
}

#[tokio::test(start_paused = true)]
async fn retry_cap_reports_abandoned_keys() {
    let (source, destination) = stores();
    fill(&source, 3);
    source.fail_next(FailAt::AccessLevel, "photos/0001.jpg", 10);

    let mut opts = options(2, 32);
    opts.retry.max_attempts = Some(2);
    let summary = migrate(&job(&source, &destination), opts).await.unwrap();

    assert_eq!(summary.listed, 3);
    assert_eq!(summary.copied, 2);
    assert_eq!(summary.abandoned, ["photos/0001.jpg"]);
    assert!(destination.object("new", "photos/0001.jpg").is_none());

    match summary.into_result() {
        Err(MigrationError::Abandoned { keys }) => assert_eq!(keys, ["photos/0001.jpg"]),
        other => panic!("expected abandoned keys, got {other:?}"),
    }
}
