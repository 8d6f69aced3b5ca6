mod bridge_service;
mod event_registry;
mod presence_service;
mod topics;
mod vision;

pub use bridge_service::*;
pub use event_registry::*;
pub use presence_service::*;
pub use topics::*;
pub use vision::*;
