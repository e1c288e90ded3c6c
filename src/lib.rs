#![forbid(unsafe_code)]

//! Public entry point for the video service crate.
//!
//! The binary in `src/bin/backend.rs` only wires these pieces together; tests
//! build the same router against a fresh store.

pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod likes;
pub mod store;
pub mod video;

pub use error::{VideoError, VideoResult};
pub use store::VideoStore;
pub use video::{NewVideo, Video, VideoState, VideoStatus};
