//! Configuration types
//!
//! Board-agnostic drive settings stored as postcard binary data.

pub mod settings;

pub use settings::*;
