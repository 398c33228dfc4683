//! Enumerates every video a channel has uploaded.

use crate::credentials::Credentials;
use crate::youtube_api::YouTubeClient;
use eyre::Context;
use std::fmt;
use tokio_stream::StreamExt;

/// The ID of a channel's uploads playlist.
///
/// YouTube keeps this playlist distinct from the channel ID itself; it has to be looked up once
/// before the catalog can be walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUploadsHandle(String);

impl ChannelUploadsHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelUploadsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the uploads playlist of `channel_id`.
///
/// Fails with [`ReportError::ChannelNotFound`](crate::ReportError::ChannelNotFound) if YouTube
/// does not know the channel.
pub async fn resolve_uploads_handle<C: Credentials>(
    yt: &YouTubeClient<C>,
    channel_id: &str,
) -> eyre::Result<ChannelUploadsHandle> {
    let channel = yt
        .get_channel(channel_id)
        .await
        .with_context(|| format!("resolve uploads playlist of channel {channel_id}"))?;
    let uploads = channel.content_details.related_playlists.uploads;
    tracing::info!(channel_id, uploads = %uploads, "resolved uploads playlist");
    Ok(ChannelUploadsHandle(uploads))
}

/// Lists the IDs of every video in the uploads playlist, in playlist order.
///
/// Pages are concatenated in the order they were requested. Any failed page aborts the listing.
pub async fn list_video_ids<C: Credentials>(
    yt: &YouTubeClient<C>,
    handle: &ChannelUploadsHandle,
) -> eyre::Result<Vec<String>> {
    let items = yt.list_playlist_items(handle.as_str());
    let mut items = std::pin::pin!(items);
    let mut video_ids = Vec::new();
    while let Some(item) = items.next().await {
        let item = item.with_context(|| format!("list uploads playlist {handle}"))?;
        video_ids.push(item.content_details.video_id);
    }
    tracing::info!(uploads = %handle, videos = video_ids.len(), "enumerated uploads");
    Ok(video_ids)
}
