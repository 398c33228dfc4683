//! Domain errors that callers may want to tell apart.
//!
//! Everything else travels as a plain [`eyre::Report`] with context attached at each layer; these
//! variants ride inside that report and can be recovered with [`eyre::Report::downcast_ref`].

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// `channels.list` returned no items for the configured channel.
    #[error("channel not found: {channel_id}")]
    ChannelNotFound { channel_id: String },

    /// `videos.list` returned no items for a video that the uploads playlist listed.
    #[error("video not found: {video_id}")]
    VideoNotFound { video_id: String },

    /// The analytics result table did not declare a column we asked for.
    #[error("analytics response has no `{column}` column")]
    MissingColumn { column: String },

    /// An analytics cell could not be read as a number.
    #[error("analytics value `{value}` for {metric} of video {video_id} is not numeric")]
    NonNumericMetric {
        video_id: String,
        metric: &'static str,
        value: String,
    },

    #[error("config.json has no developerKey, which is required with --auth api")]
    MissingDeveloperKey,
}
