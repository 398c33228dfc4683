//! YouTube PlaylistItems API types.

use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlistItems.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: VecDeque<PlaylistItem>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    /// Token for the next page; absent on the last page.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// One entry of a playlist.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(rename = "contentDetails")]
    pub content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemContentDetails {
    /// The video the playlist entry refers to.
    #[serde(rename = "videoId")]
    pub video_id: String,
}
