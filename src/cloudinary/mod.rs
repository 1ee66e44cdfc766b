//! Cloudinary REST client.
//!
//! One [`CloudinaryClient`] per account — the source and destination each get
//! their own handle with their own credentials, so nothing ever mutates
//! process-global SDK state between calls. The [`MediaApi`] trait is the seam
//! the orchestrator works against; tests substitute in-memory stores.

pub mod client;
pub mod error;
pub mod types;

pub use client::{CloudinaryClient, MediaApi};
pub use error::ApiError;
pub use types::{Resource, ResourcePage, UploadReceipt};
