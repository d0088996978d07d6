//! File catalog implementations.

pub mod json;

pub use json::JsonFileCatalog;
