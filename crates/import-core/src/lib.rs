pub mod actions;
pub mod affordance;
pub mod error;
pub mod event_bus;
pub mod headline;
pub mod log_view;
pub mod progress;
pub mod service;
pub mod tracker;
