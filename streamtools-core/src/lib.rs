// src/lib.rs

pub mod audio;
pub mod auth;
pub mod cache;
pub mod chat;
pub mod config;
pub mod eventbus;
pub mod platforms;
pub mod playback;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use streamtools_common::error::Error;
pub use streamtools_common::models;
pub use streamtools_common::traits;
