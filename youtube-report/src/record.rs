//! The merged per-video record that ends up as one CSV row.

use jiff::Timestamp;
use jiff::civil::Date;

/// What kind of report a run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Catalog and lifetime counters only.
    Catalog,
    /// Catalog, lifetime counters, and metrics restricted to `start..=end`.
    Report { start: Date, end: Date },
}

impl RunMode {
    pub fn is_report(&self) -> bool {
        matches!(self, RunMode::Report { .. })
    }
}

/// One video of the channel.
///
/// `window` is `None` for [`RunMode::Catalog`] runs. In [`RunMode::Report`] runs it is always
/// `Some`, with every field zero when the analytics query had no row for the video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub published_at: Timestamp,
    pub lifetime: LifetimeCounters,
    pub window: Option<WindowMetrics>,
}

/// Counters accumulated since the video was published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifetimeCounters {
    pub views: u64,
    pub likes: u64,
    pub dislikes: u64,
    pub favorites: u64,
    pub comments: u64,
}

/// Metrics computed by YouTube Analytics over the requested date range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowMetrics {
    pub views: f64,
    pub estimated_minutes_watched: f64,
    pub average_view_duration: f64,
    pub comments: f64,
    pub likes: f64,
    pub dislikes: f64,
    pub subscribers_gained: f64,
    pub subscribers_lost: f64,
}

impl WindowMetrics {
    /// Analytics metric names, in the order they are requested and written out.
    pub const METRICS: [&'static str; 8] = [
        "views",
        "estimatedMinutesWatched",
        "averageViewDuration",
        "comments",
        "likes",
        "dislikes",
        "subscribersGained",
        "subscribersLost",
    ];

    /// Builds the metrics from values given in [`Self::METRICS`] order.
    pub fn from_values(values: [f64; 8]) -> Self {
        let [
            views,
            estimated_minutes_watched,
            average_view_duration,
            comments,
            likes,
            dislikes,
            subscribers_gained,
            subscribers_lost,
        ] = values;
        Self {
            views,
            estimated_minutes_watched,
            average_view_duration,
            comments,
            likes,
            dislikes,
            subscribers_gained,
            subscribers_lost,
        }
    }

    /// The values in [`Self::METRICS`] order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.views,
            self.estimated_minutes_watched,
            self.average_view_duration,
            self.comments,
            self.likes,
            self.dislikes,
            self.subscribers_gained,
            self.subscribers_lost,
        ]
    }
}
