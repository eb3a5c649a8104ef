pub mod error;
pub mod frappe;
