pub mod actor;
pub mod coordinator;
pub mod import;
pub mod messages;
pub mod scheduler;
pub mod spawn;

pub use actor::{Actor, ActorContext, ActorRef};
pub use coordinator::ImportCoordinator;
