//! YouTube Channels API types.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `channels.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelListResponse {
    /// Channels matching the request. Omitted entirely when nothing matched.
    #[serde(default)]
    pub items: VecDeque<Channel>,
}

/// A `channel` resource, restricted to the parts this crate requests.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "contentDetails")]
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    pub related_playlists: RelatedPlaylists,
}

/// Playlists that YouTube maintains for every channel.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelatedPlaylists {
    /// The playlist holding every video the channel uploaded.
    pub uploads: String,
}
