pub mod sqlite_channel_repository;
pub mod sqlite_record_repository;
pub mod sqlite_result_repository;
pub mod sqlite_task_repository;
pub mod sqlite_topic_repository;
pub mod sqlite_worker_error_repository;
pub mod sqlite_worker_repository;

pub use sqlite_channel_repository::SqliteChannelRepository;
pub use sqlite_record_repository::SqliteRecordRepository;
pub use sqlite_result_repository::SqliteResultRepository;
pub use sqlite_task_repository::SqliteTaskRepository;
pub use sqlite_topic_repository::SqliteTopicRepository;
pub use sqlite_worker_error_repository::SqliteWorkerErrorRepository;
pub use sqlite_worker_repository::SqliteWorkerRepository;
