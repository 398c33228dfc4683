//! Thin client for the parts of the YouTube Data API v3 and YouTube Analytics API v2 that the
//! report needs.
//!
//! Only the resource fields that end up in a report are modelled. List endpoints are exposed as
//! [`Stream`](tokio_stream::Stream)s that fetch the next page lazily, see [`PagedStream`].

pub mod channels;
pub mod client;
pub mod playlist_items;
pub mod reports;
pub mod types;
pub mod videos;

pub use client::{MAX_PAGE_SIZE, YouTubeClient};
pub use reports::{ReportQuery, ResultTable};
pub use types::{PageInfo, PagedStream};
