//! Drive settings persistence

pub mod persistence;

pub use persistence::{load_settings, save_settings, try_load_settings, PersistenceError};
