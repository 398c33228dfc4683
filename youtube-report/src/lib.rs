//! Exports a YouTube channel's uploads, with lifetime counters and optionally date-ranged
//! analytics, to a CSV file that spreadsheet applications open correctly.
//!
//! A run is strictly sequential: resolve the uploads playlist, page through it, fetch every
//! video, optionally query analytics once for all of them, merge, and write. The first error
//! aborts the run before anything is written.

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod oauth;
pub mod record;
pub mod report;
pub mod youtube_api;

pub use analytics::{AnalyticsRowSet, fetch_analytics};
pub use catalog::{ChannelUploadsHandle, list_video_ids, resolve_uploads_handle};
pub use config::Config;
pub use credentials::{ApiKey, Credentials, OAuthToken};
pub use error::ReportError;
pub use merge::merge;
pub use metadata::fetch_metadata;
pub use record::{LifetimeCounters, RunMode, VideoRecord, WindowMetrics};
pub use report::{Labels, ReportWriter, WriterConfig};
pub use youtube_api::YouTubeClient;

use eyre::Context;
use std::path::PathBuf;

/// Collects the records for every upload of `channel_id`, ready to be written.
#[tracing::instrument(skip(yt))]
pub async fn collect_records<C: Credentials>(
    yt: &YouTubeClient<C>,
    channel_id: &str,
    mode: &RunMode,
) -> eyre::Result<Vec<VideoRecord>> {
    // ==============================================================================
    // Catalog
    // ==============================================================================
    let uploads = resolve_uploads_handle(yt, channel_id).await?;
    let video_ids = list_video_ids(yt, &uploads).await?;

    // One request per video. videos.list could take up to 50 ids at once, but the per-video
    // form keeps a missing video attributable to its id.
    let mut records = Vec::with_capacity(video_ids.len());
    for (i, video_id) in video_ids.iter().enumerate() {
        tracing::debug!(video_id, n = i + 1, of = video_ids.len(), "fetching video");
        records.push(fetch_metadata(yt, video_id).await?);
    }

    // ==============================================================================
    // Analytics
    // ==============================================================================
    match *mode {
        RunMode::Catalog => Ok(records),
        RunMode::Report { start, end } => {
            let rows = fetch_analytics(yt, &video_ids, start, end).await?;
            Ok(merge(records, &rows))
        }
    }
}

/// Runs the whole pipeline and returns the path of the written report.
pub async fn run<C: Credentials>(
    yt: &YouTubeClient<C>,
    channel_id: &str,
    mode: &RunMode,
    writer: &ReportWriter,
) -> eyre::Result<PathBuf> {
    let records = collect_records(yt, channel_id, mode)
        .await
        .with_context(|| format!("collect videos of channel {channel_id}"))?;
    writer.write(&records, mode).await
}
