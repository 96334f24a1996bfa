pub mod database;
pub mod event_bus;

pub use database::*;
pub use event_bus::*;
