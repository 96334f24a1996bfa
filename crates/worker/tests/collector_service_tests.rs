use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use silvermoon_domain::events::EventName;
use silvermoon_errors::{ErrorKind, SilvermoonError, SilvermoonResult};
use silvermoon_testing_utils::{MockEventBus, MockStore};
use silvermoon_worker::{
    CollectedItem, CollectorService, CollectorSource, JsonLinesSource, WorkerRegistry,
};
use tokio::sync::broadcast;

/// 按脚本返回条目的数据源
struct ScriptedSource {
    items: VecDeque<SilvermoonResult<Option<CollectedItem>>>,
}

impl ScriptedSource {
    fn new(items: Vec<SilvermoonResult<Option<CollectedItem>>>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

#[async_trait]
impl CollectorSource for ScriptedSource {
    async fn next_item(&mut self) -> SilvermoonResult<Option<CollectedItem>> {
        self.items.pop_front().unwrap_or(Ok(None))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

fn item(channel: &str, text: &str) -> CollectedItem {
    CollectedItem {
        channel: channel.to_string(),
        payload: json!({"text": text}).as_object().cloned().unwrap(),
        text: Some(text.to_string()),
    }
}

async fn service(store: &MockStore, bus: Arc<MockEventBus>) -> CollectorService {
    let collector = WorkerRegistry::new(store.repositories())
        .register_collector("Telegram", bus)
        .await
        .unwrap();
    CollectorService::new(collector, Duration::from_millis(10))
}

#[tokio::test]
async fn test_collects_file_until_end() {
    let store = MockStore::new();
    let bus = Arc::new(MockEventBus::new());
    let service = service(&store, bus.clone()).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"channel": "news", "payload": {{"text": "a"}}, "text": "a"}}"#).unwrap();
    writeln!(file, "garbage").unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"channel": "sports", "payload": {{"score": 3}}}}"#).unwrap();
    let path = file.path().to_path_buf();

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    service
        .run(|| JsonLinesSource::open(path.clone()), shutdown_rx)
        .await
        .unwrap();

    assert_eq!(store.records.all().len(), 2);
    assert_eq!(store.channels.count(), 2);
    assert_eq!(bus.published_of(EventName::NewData).len(), 2);

    let errors = store.errors.all();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorKind::Data);
    assert_eq!(errors[0].worker_name, "Telegram");
}

#[tokio::test]
async fn test_reconnects_after_source_failure() {
    let store = MockStore::new();
    let bus = Arc::new(MockEventBus::new());
    let service = service(&store, bus.clone()).await;

    let attempts = Arc::new(AtomicUsize::new(0));
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let counter = attempts.clone();
    service
        .run(
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    match attempt {
                        0 => Err(SilvermoonError::external_service("connection refused")),
                        1 => Ok(ScriptedSource::new(vec![
                            Ok(Some(item("news", "first"))),
                            Err(SilvermoonError::external_service("connection reset")),
                        ])),
                        _ => Ok(ScriptedSource::new(vec![Ok(Some(item("news", "second")))])),
                    }
                }
            },
            shutdown_rx,
        )
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let texts: Vec<Option<String>> = store
        .records
        .all()
        .into_iter()
        .map(|r| r.friendly_text)
        .collect();
    assert_eq!(texts, vec![Some("first".to_string()), Some("second".to_string())]);

    let errors = store.errors.all();
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| e.error_type == ErrorKind::ExternalService));
}

#[tokio::test]
async fn test_store_failure_does_not_stop_collection() {
    let store = MockStore::new();
    let bus = Arc::new(MockEventBus::new());
    let service = service(&store, bus.clone()).await;
    bus.set_should_fail(true);

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    service
        .run(
            || async {
                Ok(ScriptedSource::new(vec![
                    Ok(Some(item("news", "a"))),
                    Ok(Some(item("news", "b"))),
                ]))
            },
            shutdown_rx,
        )
        .await
        .unwrap();

    let errors = store.errors.all();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.error_type == ErrorKind::Persistence));
}

#[tokio::test]
async fn test_shutdown_interrupts_reconnect_wait() {
    let store = MockStore::new();
    let bus = Arc::new(MockEventBus::new());
    let collector = WorkerRegistry::new(store.repositories())
        .register_collector("Telegram", bus)
        .await
        .unwrap();
    let service = CollectorService::new(collector, Duration::from_secs(3600));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let run = service.run(
        || async { Err::<ScriptedSource, _>(SilvermoonError::external_service("down")) },
        shutdown_rx,
    );
    let stop = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
    };

    let (result, _) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, stop) })
        .await
        .expect("collector did not stop");
    result.unwrap();
    assert_eq!(store.errors.all().len(), 1);
}
