use serde_json::json;
use silvermoon_config::DatabaseConfig;
use silvermoon_domain::entities::{
    AnalysisResult, AnalysisTask, AnalysisTaskTrigger, DataChannel, Importance, JsonMap, Record,
    Topic, Worker, WorkerError, WorkerKind,
};
use silvermoon_domain::events::EventName;
use silvermoon_domain::repositories::Repositories;
use silvermoon_errors::ErrorKind;
use silvermoon_infrastructure::DatabaseManager;
use uuid::Uuid;

async fn setup() -> (DatabaseManager, Repositories) {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let manager = DatabaseManager::new(&config).await.unwrap();
    manager.migrate().await.unwrap();
    // 重复迁移不报错
    manager.migrate().await.unwrap();
    let repositories = manager.repositories();
    (manager, repositories)
}

fn payload(value: serde_json::Value) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_worker_round_trip_and_update() {
    let (_manager, repos) = setup().await;

    let mut worker = Worker::new("GPTAnalyser", WorkerKind::Analyser);
    worker.register_config("model", json!("gpt-4o-mini"));
    repos.workers.create(&worker).await.unwrap();

    let found = repos.workers.find_by_name("GPTAnalyser").await.unwrap().unwrap();
    assert_eq!(found.uuid, worker.uuid);
    assert_eq!(found.kind, WorkerKind::Analyser);
    assert_eq!(found.get_config("model"), Some(&json!("gpt-4o-mini")));

    worker.set_config("api_key", json!("sk-test"));
    worker.metadata.insert("hostname".to_string(), json!("node-1"));
    repos.workers.update(&worker).await.unwrap();

    let found = repos.workers.find_by_uuid(worker.uuid).await.unwrap().unwrap();
    assert_eq!(found.get_config("api_key"), Some(&json!("sk-test")));
    assert_eq!(found.metadata.get("hostname"), Some(&json!("node-1")));

    assert!(repos.workers.find_by_name("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_worker_name_is_unique() {
    let (_manager, repos) = setup().await;

    repos
        .workers
        .create(&Worker::new("Telegram", WorkerKind::Collector))
        .await
        .unwrap();
    let duplicate = repos
        .workers
        .create(&Worker::new("Telegram", WorkerKind::Collector))
        .await;

    let err = duplicate.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
}

#[tokio::test]
async fn test_update_unknown_worker_fails() {
    let (_manager, repos) = setup().await;
    let worker = Worker::new("ghost", WorkerKind::Analyser);
    assert!(repos.workers.update(&worker).await.is_err());
}

#[tokio::test]
async fn test_channel_and_record_round_trip() {
    let (_manager, repos) = setup().await;
    let collector = Worker::new("Telegram", WorkerKind::Collector);
    repos.workers.create(&collector).await.unwrap();

    let topic = Topic::new("finance");
    repos.topics.create(&topic).await.unwrap();
    assert_eq!(
        repos.topics.find_by_name("finance").await.unwrap().unwrap().uuid,
        topic.uuid
    );

    let mut channel = DataChannel::new(collector.uuid, "-100123", "Market news");
    channel.topics.push(topic.uuid);
    repos.channels.create(&channel).await.unwrap();

    let found = repos
        .channels
        .find_by_collector_uid(collector.uuid, "-100123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.uuid, channel.uuid);
    assert_eq!(found.topics, vec![topic.uuid]);
    assert!(repos
        .channels
        .find_by_collector_uid(Uuid::new_v4(), "-100123")
        .await
        .unwrap()
        .is_none());

    let record = Record::new(
        channel.uuid,
        payload(json!({"text": "hello", "nested": {"n": 1}})),
        Some("hello".to_string()),
    );
    repos.records.create(&record).await.unwrap();

    let found = repos.records.find_by_uuid(record.uuid).await.unwrap().unwrap();
    assert_eq!(found.payload, record.payload);
    assert_eq!(found.friendly_text.as_deref(), Some("hello"));
    assert_eq!(found.channel_uuid, channel.uuid);
}

#[tokio::test]
async fn test_tasks_keep_trigger_order() {
    let (_manager, repos) = setup().await;
    let analyser = Worker::new("GPTAnalyser", WorkerKind::Analyser);
    let collector = Worker::new("Telegram", WorkerKind::Collector);
    repos.workers.create(&analyser).await.unwrap();
    repos.workers.create(&collector).await.unwrap();

    let task = AnalysisTask::new("summarise", analyser.uuid)
        .with_trigger(
            AnalysisTaskTrigger::new(vec![EventName::NewData], collector.uuid)
                .with_parameter("prompt", json!("first {{ payload.text }}")),
        )
        .with_trigger(
            AnalysisTaskTrigger::new(vec![EventName::NewData], collector.uuid)
                .with_parameter("prompt", json!("second {{ payload.text }}")),
        );
    repos.tasks.create(&task).await.unwrap();

    let other = Worker::new("OtherAnalyser", WorkerKind::Analyser);
    repos.workers.create(&other).await.unwrap();
    repos
        .tasks
        .create(&AnalysisTask::new("other analyser", other.uuid))
        .await
        .unwrap();

    let tasks: Vec<AnalysisTask> = repos
        .tasks
        .find_by_analyser(analyser.uuid)
        .await
        .unwrap()
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0], task);
    assert_eq!(
        tasks[0].triggers[1].parameters.get("prompt"),
        Some(&json!("second {{ payload.text }}"))
    );
}

#[tokio::test]
async fn test_malformed_task_row_does_not_hide_other_tasks() {
    let (manager, repos) = setup().await;
    let analyser = Worker::new("GPTAnalyser", WorkerKind::Analyser);
    let collector = Worker::new("Telegram", WorkerKind::Collector);
    repos.workers.create(&analyser).await.unwrap();
    repos.workers.create(&collector).await.unwrap();

    let good = AnalysisTask::new("Good", analyser.uuid).with_trigger(
        AnalysisTaskTrigger::new(vec![EventName::NewData], collector.uuid)
            .with_parameter("prompt", json!("{{ payload.text }}")),
    );
    repos.tasks.create(&good).await.unwrap();

    // 界面写入了本版本不认识的事件名
    let broken_triggers = json!([{
        "events": ["NEW_ALERT"],
        "worker_uuid": collector.uuid,
        "parameters": {"prompt": "x"}
    }]);
    sqlx::query(
        "INSERT INTO analysis_tasks (uuid, name, analyser_uuid, triggers) VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind("Edited")
    .bind(analyser.uuid.to_string())
    .bind(broken_triggers.to_string())
    .execute(manager.pool())
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO analysis_tasks (uuid, name, analyser_uuid) VALUES ('not-a-uuid', 'BadId', ?)",
    )
    .bind(analyser.uuid.to_string())
    .execute(manager.pool())
    .await
    .unwrap();

    let loaded = repos.tasks.find_by_analyser(analyser.uuid).await.unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0].as_ref().unwrap(), &good);

    let edited = loaded[1].as_ref().unwrap_err();
    assert_eq!(edited.kind(), ErrorKind::Data);
    assert!(edited.to_string().contains("Edited"));
    assert!(edited.to_string().contains("NEW_ALERT"));

    let bad_id = loaded[2].as_ref().unwrap_err();
    assert_eq!(bad_id.kind(), ErrorKind::Data);
    assert!(bad_id.to_string().contains("not-a-uuid"));
}

#[tokio::test]
async fn test_result_round_trip() {
    let (_manager, repos) = setup().await;
    let analyser = Worker::new("GPTAnalyser", WorkerKind::Analyser);
    repos.workers.create(&analyser).await.unwrap();

    let result = AnalysisResult {
        uuid: Uuid::new_v4(),
        name: "GPT Analysis - summarise".to_string(),
        analyser_uuid: analyser.uuid,
        task_uuid: Uuid::new_v4(),
        origin_record_uuid: Uuid::new_v4(),
        origin_result_uuid: Some(Uuid::new_v4()),
        payload: payload(json!({"result": null})),
        metadata: payload(json!({"total_tokens": 12})),
        display: payload(json!({"result": "markdown"})),
        importance: Importance::High,
        hidden: false,
        created_at: chrono::Utc::now(),
    };
    repos.results.create(&result).await.unwrap();

    let found = repos.results.find_by_uuid(result.uuid).await.unwrap().unwrap();
    assert_eq!(found.importance, Importance::High);
    assert_eq!(found.origin_result_uuid, result.origin_result_uuid);
    assert_eq!(found.payload.get("result"), Some(&serde_json::Value::Null));

    let by_task = repos.results.find_by_task(result.task_uuid).await.unwrap();
    assert_eq!(by_task.len(), 1);
}

#[tokio::test]
async fn test_worker_errors_listing_and_read_flag() {
    let (_manager, repos) = setup().await;

    let first = WorkerError::new("GPTAnalyser", ErrorKind::ExternalService, "HTTP 503");
    let mut second = WorkerError::new("GPTAnalyser", ErrorKind::Data, "missing prompt");
    second.created_at = first.created_at + chrono::Duration::seconds(1);
    second.traceback = Some("触发器缺少模板参数: prompt".to_string());
    repos.errors.create(&first).await.unwrap();
    repos.errors.create(&second).await.unwrap();

    let listed = repos.errors.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].uuid, second.uuid);
    assert_eq!(listed[0].error_type, ErrorKind::Data);
    assert_eq!(repos.errors.count_unread().await.unwrap(), 2);

    assert!(repos.errors.mark_read(first.uuid).await.unwrap());
    assert!(!repos.errors.mark_read(Uuid::new_v4()).await.unwrap());
    assert_eq!(repos.errors.count_unread().await.unwrap(), 1);
}
