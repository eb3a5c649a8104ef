pub mod actor;
pub mod error;
pub mod settings;
pub mod source;
pub mod view;
