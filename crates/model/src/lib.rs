pub mod events;
pub mod job;
pub mod log;
pub mod status;
