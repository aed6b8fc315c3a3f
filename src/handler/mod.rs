//! Request handler module
//!
//! Routes requests to the upload, listing, fetch and bulk-download handlers.

pub mod images;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
