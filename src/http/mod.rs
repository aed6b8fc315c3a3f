//! HTTP protocol layer module
//!
//! Response builders, MIME detection and cache validation, kept apart from
//! the image handlers that use them.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used builders
pub use response::{
    build_405_response, build_archive_response, build_error_response, build_health_response,
    build_image_response, json_response,
};
