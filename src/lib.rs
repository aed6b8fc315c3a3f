//! Image upload and retrieval HTTP service
//!
//! Clients push raw image bytes to `POST /upload`; the bytes land in a flat
//! upload directory under a timestamped name. Stored images can be listed,
//! fetched one at a time, or downloaded together as a zip archive.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod store;

pub use error::ImageError;
pub use store::ImageStore;
