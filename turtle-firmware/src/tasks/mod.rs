//! Embassy async tasks

pub mod motion;

pub use motion::{motion_task, Drive};
