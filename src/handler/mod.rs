//! Request handler module
//!
//! Responsible for page path routing and the view/edit/save operations.

mod error;
mod pages;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
