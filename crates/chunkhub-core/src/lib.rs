//! # chunkhub-core
//!
//! Core crate for ChunkHub. Contains the storage and catalog traits,
//! configuration schemas, the chunk/record upload types, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other ChunkHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
