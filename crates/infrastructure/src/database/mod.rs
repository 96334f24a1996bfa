pub mod manager;
pub mod mapping;
pub mod sqlite;

pub use manager::DatabaseManager;
pub use sqlite::{
    SqliteChannelRepository, SqliteRecordRepository, SqliteResultRepository,
    SqliteTaskRepository, SqliteTopicRepository, SqliteWorkerErrorRepository,
    SqliteWorkerRepository,
};
