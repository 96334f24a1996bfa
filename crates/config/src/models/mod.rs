pub mod app_config;
pub mod database;
pub mod event_bus;
pub mod observability;
pub mod reasoning;
pub mod workers;

pub use app_config::*;
pub use database::*;
pub use event_bus::*;
pub use observability::*;
pub use reasoning::*;
pub use workers::*;
