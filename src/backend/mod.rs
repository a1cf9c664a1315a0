pub mod actor;
pub mod bridge;
pub mod messages;

pub use actor::BackendActor;
pub use bridge::ProgressBridge;
pub use messages::{BackendCommand, BackendEvent, ToolStatus};
