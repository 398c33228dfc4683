//! Joins video metadata with analytics rows.

use crate::analytics::AnalyticsRowSet;
use crate::record::VideoRecord;

/// Attaches window metrics from `rows` to each record of `metadata`.
///
/// This is a left join on the video ID: the output has exactly one record per input record, in
/// input order. Videos without an analytics row get all-zero metrics, and rows for videos not in
/// `metadata` are dropped.
pub fn merge(metadata: Vec<VideoRecord>, rows: &AnalyticsRowSet) -> Vec<VideoRecord> {
    let mut unmatched = 0usize;
    let merged: Vec<_> = metadata
        .into_iter()
        .map(|mut record| {
            let window = match rows.get(&record.id) {
                Some(metrics) => *metrics,
                None => {
                    unmatched += 1;
                    Default::default()
                }
            };
            record.window = Some(window);
            record
        })
        .collect();
    tracing::debug!(
        records = merged.len(),
        unmatched,
        "merged analytics into metadata"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LifetimeCounters, WindowMetrics};
    use crate::youtube_api::ResultTable;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(id: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            title: format!("video {id}"),
            published_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            lifetime: LifetimeCounters {
                views: 100,
                ..Default::default()
            },
            window: None,
        }
    }

    fn rows(rows: serde_json::Value) -> AnalyticsRowSet {
        let headers: Vec<_> = std::iter::once("video")
            .chain(WindowMetrics::METRICS)
            .map(|name| json!({ "name": name, "columnType": "METRIC", "dataType": "FLOAT" }))
            .collect();
        let table: ResultTable =
            serde_json::from_value(json!({ "columnHeaders": headers, "rows": rows })).unwrap();
        AnalyticsRowSet::from_table(&table).unwrap()
    }

    #[test]
    fn unmatched_videos_get_zero_metrics() {
        let merged = merge(
            vec![record("a"), record("b"), record("c")],
            &rows(json!([
                ["c", 3, 3, 3, 3, 3, 3, 3, 3],
                ["a", 1, 2, 3, 4, 5, 6, 7, 8],
            ])),
        );

        let ids: Vec<_> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(
            merged[0].window,
            Some(WindowMetrics::from_values([1., 2., 3., 4., 5., 6., 7., 8.]))
        );
        assert_eq!(merged[1].window, Some(WindowMetrics::default()));
        assert_eq!(merged[2].window.unwrap().views, 3.);
    }

    #[test]
    fn length_follows_metadata_not_rows() {
        let analytics = rows(json!([
            ["a", 1, 1, 1, 1, 1, 1, 1, 1],
            ["x", 1, 1, 1, 1, 1, 1, 1, 1],
            ["y", 1, 1, 1, 1, 1, 1, 1, 1],
        ]));
        assert_eq!(merge(vec![record("a")], &analytics).len(), 1);
        assert_eq!(merge(Vec::new(), &analytics).len(), 0);

        let merged = merge(vec![record("a"), record("b")], &AnalyticsRowSet::default());
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|r| r.window == Some(WindowMetrics::default())));
    }

    #[test]
    fn metadata_is_untouched() {
        let merged = merge(vec![record("a")], &AnalyticsRowSet::default());
        assert_eq!(
            VideoRecord {
                window: None,
                ..merged[0].clone()
            },
            record("a")
        );
    }
}
