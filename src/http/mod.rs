//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from page logic.

pub mod form;
pub mod response;

// Re-export commonly used types
pub use form::form_value;
pub use response::{
    build_404_response, build_413_response, build_500_response, build_html_response,
    build_redirect_response,
};
