//! Core YouTube API client.

use crate::credentials::Credentials;
use crate::error::ReportError;
use crate::youtube_api::{
    channels::{Channel, ChannelListResponse},
    playlist_items::{PlaylistItem, PlaylistItemListResponse},
    reports::{ReportQuery, ResultTable},
    types::PagedStream,
    videos::{Video, VideoListResponse},
};
use eyre::Context;
use serde::de::DeserializeOwned;
use tokio_stream::Stream;
use tracing::instrument;

const DATA_API: &str = "https://www.googleapis.com/youtube/v3";
const ANALYTICS_API: &str = "https://youtubeanalytics.googleapis.com/v2";

/// Largest `maxResults` the Data API accepts for list calls.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Client for the YouTube Data API v3 and YouTube Analytics API v2.
///
/// Every request goes through `C` for authorization. Requests are issued one at a time and are
/// never retried; a non-2xx status becomes an error carrying the response body.
#[derive(Debug)]
pub struct YouTubeClient<C> {
    credentials: C,
    client: reqwest::Client,
    data_api: String,
    analytics_api: String,
}

impl<C: Credentials> YouTubeClient<C> {
    pub fn new(credentials: C) -> Self {
        Self::with_base_urls(credentials, DATA_API, ANALYTICS_API)
    }

    /// Points the client at other API roots, e.g. a mock server.
    pub fn with_base_urls(
        credentials: C,
        data_api: impl Into<String>,
        analytics_api: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            client: reqwest::Client::new(),
            data_api: data_api.into().trim_end_matches('/').to_string(),
            analytics_api: analytics_api.into().trim_end_matches('/').to_string(),
        }
    }

    /// Makes an authorized GET request and decodes the JSON response.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<T> {
        let request = self.client.get(url).query(query_params);
        let request = self
            .credentials
            .authorize(request)
            .await
            .context("authorize YouTube API request")?;

        // the request URL may carry an API key, so keep it out of transport errors
        let response = request
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("send GET request to YouTube API: {url}"))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!(
                "YouTube API GET request to {url} failed with status {status_code}: {error_text}"
            );
        }

        response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("parse YouTube API response from {url} as JSON"))
    }

    /// Looks up a channel by its ID.
    ///
    /// Only the `contentDetails` part is requested, which is where the uploads playlist lives.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self))]
    pub async fn get_channel(&self, channel_id: &str) -> eyre::Result<Channel> {
        let url = format!("{}/channels", self.data_api);
        let query_params = [("part", "contentDetails"), ("id", channel_id)];

        let channels: ChannelListResponse = self
            .get_json(&url, &query_params)
            .await
            .context("list channels")?;

        tracing::debug!(
            channel_id,
            returned_items = channels.items.len(),
            "fetched channel"
        );

        channels.items.into_iter().next().ok_or_else(|| {
            ReportError::ChannelNotFound {
                channel_id: channel_id.to_string(),
            }
            .into()
        })
    }

    /// Returns a paginated stream of every item in a playlist, in playlist order.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip(self))]
    pub fn list_playlist_items<'a>(
        &'a self,
        playlist_id: &'a str,
    ) -> impl Stream<Item = eyre::Result<PlaylistItem>> + Send + use<'a, C> {
        PagedStream::new(move |page_token| async move {
            let response = self
                .list_playlist_items_internal(playlist_id, MAX_PAGE_SIZE, page_token)
                .await?;
            Ok((response.items, response.next_page_token))
        })
    }

    async fn list_playlist_items_internal(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<PlaylistItemListResponse> {
        let url = format!("{}/playlistItems", self.data_api);
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results_string.as_str()),
        ];
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let items: PlaylistItemListResponse = self
            .get_json(&url, &query_params)
            .await
            .context("list playlist items")?;

        tracing::debug!(
            playlist_id,
            total_results = items.page_info.total_results,
            returned_items = items.items.len(),
            has_next_page = items.next_page_token.is_some(),
            "fetched playlist page"
        );

        Ok(items)
    }

    /// Gets the snippet and lifetime statistics of one video.
    ///
    /// See: <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self))]
    pub async fn get_video(&self, video_id: &str) -> eyre::Result<Video> {
        let url = format!("{}/videos", self.data_api);
        let query_params = [("part", "snippet,statistics"), ("id", video_id)];

        let videos: VideoListResponse = self
            .get_json(&url, &query_params)
            .await
            .context("list videos")?;

        tracing::debug!(
            video_id,
            returned_items = videos.items.len(),
            "fetched video"
        );

        videos.items.into_iter().next().ok_or_else(|| {
            ReportError::VideoNotFound {
                video_id: video_id.to_string(),
            }
            .into()
        })
    }

    /// Runs a YouTube Analytics report query.
    ///
    /// The dates are passed through as given; the API decides whether the range is acceptable.
    ///
    /// See: <https://developers.google.com/youtube/analytics/reference/reports/query>
    #[instrument(skip(self))]
    pub async fn query_report(&self, query: &ReportQuery<'_>) -> eyre::Result<ResultTable> {
        let url = format!("{}/reports", self.analytics_api);
        let start_date = query.start_date.to_string();
        let end_date = query.end_date.to_string();
        let metrics = query.metrics.join(",");
        let mut query_params = vec![
            ("ids", query.ids),
            ("startDate", start_date.as_str()),
            ("endDate", end_date.as_str()),
            ("metrics", metrics.as_str()),
            ("dimensions", query.dimensions),
        ];
        if let Some(ref filters) = query.filters {
            query_params.push(("filters", filters.as_str()));
        }

        let table: ResultTable = self
            .get_json(&url, &query_params)
            .await
            .context("query analytics report")?;

        tracing::debug!(
            columns = table.column_headers.len(),
            rows = table.rows.len(),
            "fetched analytics report"
        );

        Ok(table)
    }
}
