//! YouTube Videos API types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `videos.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: VecDeque<Video>,
}

/// A `video` resource with its `snippet` and `statistics` parts.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
    #[serde(rename = "publishedAt")]
    pub published_at: Timestamp,
}

/// Lifetime statistics about the video.
///
/// YouTube encodes every count as a decimal string and leaves out counts the caller may not see.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#statistics>
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VideoStatistics {
    #[serde(rename = "viewCount")]
    pub view_count: Option<String>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<String>,
    /// Only visible to the video owner.
    #[serde(rename = "dislikeCount")]
    pub dislike_count: Option<String>,
    /// Deprecated by YouTube; always 0 when present.
    #[serde(rename = "favoriteCount")]
    pub favorite_count: Option<String>,
    #[serde(rename = "commentCount")]
    pub comment_count: Option<String>,
}
