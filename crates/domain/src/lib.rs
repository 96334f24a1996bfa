pub mod entities;
pub mod events;
pub mod messaging;
pub mod reasoning;
pub mod repositories;

pub use entities::*;
pub use events::*;
pub use messaging::*;
pub use reasoning::*;
pub use repositories::*;
pub use silvermoon_errors::{ErrorKind, SilvermoonError, SilvermoonResult};
