use serde::{Deserialize, Serialize};

use super::VideoId;

/// A media file registered in the store.
///
/// `stopped_at_s` is the last observed playback position and is used as
/// the resume hint the next time the same path is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub path: String,
    pub duration_s: f64,
    pub format: String,
    pub size_bytes: i64,
    pub stopped_at_s: f64,
}
