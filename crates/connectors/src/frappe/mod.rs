//! Job control and log services backed by a Frappe site.

pub mod client;
pub mod config;
pub mod dto;

pub use client::FrappeClient;
pub use config::FrappeConfig;
