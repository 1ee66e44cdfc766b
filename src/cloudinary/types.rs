//! Wire types for the Cloudinary admin and upload APIs.

use serde::{Deserialize, Serialize};

fn default_format() -> String {
    "jpg".to_string()
}

/// One asset as reported by the resource listing.
///
/// Immutable snapshot taken at listing time; the source may change between
/// listing and transfer (not guarded against). `public_id` is the stable key
/// across both accounts and doubles as the resume/dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub public_id: String,
    #[serde(default)]
    pub folder: String,
    /// Delivery URL the bytes are fetched from.
    #[serde(alias = "source_url")]
    pub secure_url: String,
    #[serde(default = "default_format")]
    pub format: String,
}

/// One page of the resource listing plus the continuation cursor.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcePage {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Provider's answer to an upload call.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub public_id: String,
    #[serde(default)]
    pub bytes: u64,
    /// True when the destination already held this public_id and
    /// `overwrite=false` left it untouched.
    #[serde(default)]
    pub existing: bool,
}
