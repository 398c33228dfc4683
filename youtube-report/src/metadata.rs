//! Per-video metadata and lifetime counters.

use crate::credentials::Credentials;
use crate::record::{LifetimeCounters, VideoRecord};
use crate::youtube_api::YouTubeClient;
use crate::youtube_api::videos::{Video, VideoStatistics};
use eyre::Context;

/// Fetches one video and turns it into a record without window metrics.
pub async fn fetch_metadata<C: Credentials>(
    yt: &YouTubeClient<C>,
    video_id: &str,
) -> eyre::Result<VideoRecord> {
    let video = yt
        .get_video(video_id)
        .await
        .with_context(|| format!("fetch metadata of video {video_id}"))?;
    to_record(video)
}

fn to_record(video: Video) -> eyre::Result<VideoRecord> {
    let lifetime = lifetime_counters(&video.statistics)
        .with_context(|| format!("read statistics of video {}", video.id))?;
    Ok(VideoRecord {
        id: video.id,
        title: video.snippet.title,
        published_at: video.snippet.published_at,
        lifetime,
        window: None,
    })
}

fn lifetime_counters(stats: &VideoStatistics) -> eyre::Result<LifetimeCounters> {
    Ok(LifetimeCounters {
        views: parse_count("viewCount", stats.view_count.as_deref())?,
        likes: parse_count("likeCount", stats.like_count.as_deref())?,
        dislikes: parse_count("dislikeCount", stats.dislike_count.as_deref())?,
        favorites: parse_count("favoriteCount", stats.favorite_count.as_deref())?,
        comments: parse_count("commentCount", stats.comment_count.as_deref())?,
    })
}

/// Counts the API withholds count as zero.
fn parse_count(field: &str, value: Option<&str>) -> eyre::Result<u64> {
    match value {
        None => Ok(0),
        Some(v) => v
            .parse()
            .with_context(|| format!("{field} `{v}` is not a count")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn video(statistics: serde_json::Value) -> Video {
        serde_json::from_value(serde_json::json!({
            "kind": "youtube#video",
            "id": "dQw4w9WgXcQ",
            "snippet": {
                "title": "Launch day",
                "publishedAt": "2024-01-05T10:00:00Z",
                "channelId": "UC123"
            },
            "statistics": statistics
        }))
        .unwrap()
    }

    #[test]
    fn counters_are_parsed_from_strings() {
        let record = to_record(video(serde_json::json!({
            "viewCount": "1024",
            "likeCount": "64",
            "dislikeCount": "2",
            "favoriteCount": "0",
            "commentCount": "8"
        })))
        .unwrap();

        assert_eq!(record.id, "dQw4w9WgXcQ");
        assert_eq!(record.title, "Launch day");
        assert_eq!(record.published_at.to_string(), "2024-01-05T10:00:00Z");
        assert_eq!(
            record.lifetime,
            LifetimeCounters {
                views: 1024,
                likes: 64,
                dislikes: 2,
                favorites: 0,
                comments: 8,
            }
        );
        assert_eq!(record.window, None);
    }

    #[test]
    fn withheld_counters_are_zero() {
        let record = to_record(video(serde_json::json!({ "viewCount": "5" }))).unwrap();
        assert_eq!(record.lifetime.views, 5);
        assert_eq!(record.lifetime.dislikes, 0);
        assert_eq!(record.lifetime.comments, 0);
    }

    #[test]
    fn garbage_counter_is_an_error() {
        assert!(to_record(video(serde_json::json!({ "viewCount": "lots" }))).is_err());
    }
}
