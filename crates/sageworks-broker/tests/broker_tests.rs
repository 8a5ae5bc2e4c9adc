use pretty_assertions::assert_eq;
use sageworks_broker::{
    connectors, BrokerConfig, BrokerError, Category, CategoryState, MetadataBroker,
};
use sageworks_test_utils::{generation_of, test_broker};
use std::sync::Arc;
use std::time::Duration;

const SHORT_TTL: Duration = Duration::from_millis(100);
const PAST_TTL: Duration = Duration::from_millis(250);
const LONG_TTL: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_cold_start_blocks_then_serves_cached() {
    let (broker, fakes) = test_broker(LONG_TTL);
    let models = &fakes[Category::Models];

    // Nothing cached: the connector is called once
    let first = broker.get_metadata(Category::Models, false).await.unwrap();
    assert_eq!(models.calls(), 1);
    assert_eq!(broker.category_state(Category::Models).await, CategoryState::Fresh);

    // Within the freshness window: same snapshot, no call
    let second = broker.get_metadata(Category::Models, false).await.unwrap();
    assert_eq!(models.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_stale_snapshot_served_while_refreshing() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let models = &fakes[Category::Models];

    let first = broker.get_metadata(Category::Models, false).await.unwrap();
    tokio::time::sleep(PAST_TTL).await;
    assert_eq!(broker.category_state(Category::Models).await, CategoryState::Stale);

    let stale = broker.get_metadata(Category::Models, false).await.unwrap();
    assert!(Arc::ptr_eq(&first, &stale));

    broker.wait_for_refreshes().await;
    assert_eq!(models.calls(), 2);

    let updated = broker.get_metadata(Category::Models, false).await.unwrap();
    assert!(updated.generation() > first.generation());
    assert_eq!(broker.category_state(Category::Models).await, CategoryState::Fresh);
}

#[tokio::test]
async fn test_warm_read_does_not_wait_for_connector() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let models = &fakes[Category::Models];

    let first = broker.get_metadata(Category::Models, false).await.unwrap();
    tokio::time::sleep(PAST_TTL).await;

    models.pause();
    let served = tokio::time::timeout(
        Duration::from_secs(1),
        broker.get_metadata(Category::Models, false),
    )
    .await
    .expect("stale read must not wait for the background refresh")
    .unwrap();
    assert_eq!(served.generation(), first.generation());

    models.wait_for_calls(2).await;
    assert_eq!(broker.stats().in_flight, 1);

    models.resume();
    broker.wait_for_refreshes().await;
    assert!(generation_of(&broker, Category::Models).await > first.generation());
}

#[tokio::test]
async fn test_forced_refresh_always_calls_connector() {
    let (broker, fakes) = test_broker(LONG_TTL);
    let endpoints = &fakes[Category::Endpoints];

    broker.get_metadata(Category::Endpoints, false).await.unwrap();
    let forced = broker.get_metadata(Category::Endpoints, true).await.unwrap();
    assert_eq!(endpoints.calls(), 2);
    assert_eq!(forced.generation(), generation_of(&broker, Category::Endpoints).await);

    endpoints.set_failing(true);
    let err = broker
        .get_metadata(Category::Endpoints, true)
        .await
        .unwrap_err();
    assert_eq!(endpoints.calls(), 3);
    assert!(err.is_retryable());

    // The failed forced refresh leaves the previous snapshot in place
    assert_eq!(generation_of(&broker, Category::Endpoints).await, forced.generation());
}

#[tokio::test]
async fn test_generations_never_go_backwards() {
    let (broker, fakes) = test_broker(Duration::from_millis(30));
    let catalog = &fakes[Category::DataCatalog];

    let mut last = 0;
    for round in 0..12 {
        if round % 4 == 3 {
            catalog.set_failing(true);
            let _ = broker.get_metadata(Category::DataCatalog, true).await;
            catalog.set_failing(false);
        }
        let snapshot = broker
            .get_metadata(Category::DataCatalog, round % 3 == 0)
            .await
            .unwrap();
        assert!(snapshot.generation() >= last);
        last = snapshot.generation();
        tokio::time::sleep(Duration::from_millis(15)).await;
    }
    broker.wait_for_refreshes().await;
    assert!(generation_of(&broker, Category::DataCatalog).await >= last);
}

#[tokio::test]
async fn test_get_all_isolates_failures() {
    let (broker, fakes) = test_broker(LONG_TTL);
    fakes[Category::FeatureStore].set_failing(true);

    let all = broker.get_all_metadata(false).await;

    assert!(!all.is_complete());
    assert_eq!(all.snapshots.len(), Category::COUNT - 1);
    assert_eq!(all.errors.keys().copied().collect::<Vec<_>>(), vec![Category::FeatureStore]);
    assert!(matches!(
        all.errors.get(&Category::FeatureStore),
        Some(BrokerError::RefreshFailed {
            category: Category::FeatureStore,
            ..
        })
    ));
    assert!(all.get(Category::Models).is_some());
}

#[tokio::test]
async fn test_forced_refresh_supersedes_background_refresh() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let models = Arc::clone(&fakes[Category::Models]);

    broker.get_metadata(Category::Models, false).await.unwrap();
    tokio::time::sleep(PAST_TTL).await;

    // Stale read launches a background refresh that parks in the connector
    models.pause();
    broker.get_metadata(Category::Models, false).await.unwrap();
    models.wait_for_calls(2).await;

    let forcing = broker.clone();
    let forced = tokio::spawn(async move { forcing.get_metadata(Category::Models, true).await });

    // The forced refresh waits for the in-flight one instead of racing it
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(models.calls(), 2);

    models.resume();
    let forced = forced.await.unwrap().unwrap();
    broker.wait_for_refreshes().await;

    assert_eq!(models.calls(), 3);
    assert_eq!(models.max_concurrent(), 1);
    assert_eq!(generation_of(&broker, Category::Models).await, forced.generation());
}

#[tokio::test]
async fn test_concurrent_cold_start_coalesces() {
    let (broker, fakes) = test_broker(LONG_TTL);
    let models = Arc::clone(&fakes[Category::Models]);
    models.pause();

    let callers: Vec<_> = (0..3)
        .map(|_| {
            let broker = broker.clone();
            tokio::spawn(async move { broker.get_metadata(Category::Models, false).await })
        })
        .collect();

    models.wait_for_calls(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    models.resume();

    let mut snapshots = Vec::new();
    for caller in callers {
        snapshots.push(caller.await.unwrap().unwrap());
    }

    assert_eq!(models.calls(), 1);
    assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test]
async fn test_background_failure_leaves_category_stale() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let sources = &fakes[Category::DataSourcesS3];

    let first = broker
        .get_metadata(Category::DataSourcesS3, false)
        .await
        .unwrap();
    tokio::time::sleep(PAST_TTL).await;

    sources.set_failing(true);
    let served = broker
        .get_metadata(Category::DataSourcesS3, false)
        .await
        .unwrap();
    broker.wait_for_refreshes().await;

    assert!(Arc::ptr_eq(&first, &served));
    assert_eq!(
        broker.category_state(Category::DataSourcesS3).await,
        CategoryState::Stale
    );
    assert_eq!(broker.stats().failed, 1);

    // Next stale read retries
    sources.set_failing(false);
    broker
        .get_metadata(Category::DataSourcesS3, false)
        .await
        .unwrap();
    broker.wait_for_refreshes().await;
    assert_eq!(sources.calls(), 3);
    assert_eq!(
        broker.category_state(Category::DataSourcesS3).await,
        CategoryState::Fresh
    );
}

#[tokio::test]
async fn test_duplicate_background_refreshes_suppressed() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let features = &fakes[Category::FeatureSetsS3];

    broker
        .get_metadata(Category::FeatureSetsS3, false)
        .await
        .unwrap();
    tokio::time::sleep(PAST_TTL).await;

    features.pause();
    for _ in 0..3 {
        broker
            .get_metadata(Category::FeatureSetsS3, false)
            .await
            .unwrap();
    }
    let stats = broker.stats();
    assert_eq!(stats.launched, 1);
    assert_eq!(stats.skipped, 2);

    features.resume();
    broker.wait_for_refreshes().await;
    assert_eq!(features.calls(), 2);
    assert_eq!(broker.stats().completed, 1);
}

#[tokio::test]
async fn test_abandoned_wait_does_not_cancel_refresh() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let models = &fakes[Category::Models];

    let first = broker.get_metadata(Category::Models, false).await.unwrap();
    tokio::time::sleep(PAST_TTL).await;

    models.pause();
    broker.get_metadata(Category::Models, false).await.unwrap();
    models.wait_for_calls(2).await;

    let waited = tokio::time::timeout(Duration::from_millis(20), broker.wait_for_refreshes()).await;
    assert!(waited.is_err());
    assert_eq!(broker.stats().in_flight, 1);

    models.resume();
    broker.wait_for_refreshes().await;

    let stats = broker.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(broker.category_state(Category::Models).await, CategoryState::Fresh);
    assert!(generation_of(&broker, Category::Models).await > first.generation());

    // Later stale reads still launch refreshes
    tokio::time::sleep(PAST_TTL).await;
    broker.get_metadata(Category::Models, false).await.unwrap();
    broker.wait_for_refreshes().await;
    assert_eq!(models.calls(), 3);
    assert_eq!(broker.stats().skipped, 0);
}

#[tokio::test]
async fn test_concurrent_waiters_block_until_refresh_done() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let endpoints = Arc::clone(&fakes[Category::Endpoints]);

    broker.get_metadata(Category::Endpoints, false).await.unwrap();
    tokio::time::sleep(PAST_TTL).await;

    endpoints.pause();
    broker.get_metadata(Category::Endpoints, false).await.unwrap();
    endpoints.wait_for_calls(2).await;

    let waiting = broker.clone();
    let first = tokio::spawn(async move { waiting.wait_for_refreshes().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = tokio::time::timeout(Duration::from_millis(100), broker.wait_for_refreshes()).await;
    assert!(second.is_err());
    assert!(!first.is_finished());

    endpoints.resume();
    first.await.unwrap();
    assert_eq!(broker.stats().in_flight, 0);
    assert_eq!(
        broker.category_state(Category::Endpoints).await,
        CategoryState::Fresh
    );
}

#[tokio::test]
async fn test_background_refresh_after_forced_reports_already_fresh() {
    let (broker, fakes) = test_broker(SHORT_TTL);
    let models = Arc::clone(&fakes[Category::Models]);

    broker.get_metadata(Category::Models, false).await.unwrap();
    tokio::time::sleep(PAST_TTL).await;

    // A forced refresh holds the category while a stale read queues behind it
    models.pause();
    let forcing = broker.clone();
    let forced = tokio::spawn(async move { forcing.refresh(Category::Models).await });
    models.wait_for_calls(2).await;
    broker.get_metadata(Category::Models, false).await.unwrap();

    models.resume();
    forced.await.unwrap().unwrap();
    broker.wait_for_refreshes().await;

    let stats = broker.stats();
    assert_eq!(models.calls(), 2);
    assert_eq!(stats.launched, 1);
    assert_eq!(stats.already_fresh, 1);
    assert_eq!(stats.completed, 0);
}

#[tokio::test]
async fn test_object_sizes_over_fake_listing() {
    let (broker, _fakes) = test_broker(LONG_TTL);

    let total = broker
        .object_sizes(Category::IncomingDataS3, "")
        .await
        .unwrap();
    assert_eq!(total, 120);

    let first = broker
        .object_sizes(Category::IncomingDataS3, "first/")
        .await
        .unwrap();
    assert_eq!(first, 100);
}

#[tokio::test]
async fn test_local_mirror_lists_directories() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = dir.path().join("sageworks");

    let sources = bucket.join("data-sources");
    std::fs::create_dir_all(sources.join("abalone_data")).unwrap();
    std::fs::create_dir_all(sources.join("wine")).unwrap();
    std::fs::write(sources.join("abalone_data/abalone.csv"), vec![b'a'; 100]).unwrap();
    std::fs::write(sources.join("wine/wine.csv"), vec![b'w'; 7]).unwrap();

    let catalog = bucket.join("data-catalog");
    std::fs::create_dir_all(catalog.join("sageworks")).unwrap();
    std::fs::create_dir_all(catalog.join("scratch")).unwrap();
    std::fs::write(catalog.join("sageworks/abalone.json"), b"{}").unwrap();
    std::fs::write(catalog.join("scratch/tmp.json"), b"{}").unwrap();

    let config = BrokerConfig::new();
    let broker =
        MetadataBroker::new(&config, connectors::local_mirror(dir.path(), &config)).unwrap();

    assert_eq!(
        broker.object_sizes(Category::DataSourcesS3, "").await.unwrap(),
        107
    );
    assert_eq!(
        broker
            .object_sizes(Category::DataSourcesS3, "abalone_data")
            .await
            .unwrap(),
        100
    );

    let tables = broker.get_metadata(Category::DataCatalog, false).await.unwrap();
    assert_eq!(tables.names().collect::<Vec<_>>(), vec!["sageworks/abalone.json"]);

    // Categories without a directory list as empty
    let models = broker.get_metadata(Category::Models, false).await.unwrap();
    assert!(models.is_empty());

    let health = broker.check_connectors().await;
    assert!(health[&Category::DataSourcesS3]);
    assert!(!health[&Category::Models]);
}
