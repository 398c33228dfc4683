//! Window-scoped metrics from YouTube Analytics, indexed by video.

use crate::credentials::Credentials;
use crate::error::ReportError;
use crate::record::WindowMetrics;
use crate::youtube_api::{ReportQuery, ResultTable, YouTubeClient};
use eyre::Context;
use jiff::civil::Date;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// The dimension the report is grouped by, which is also the lookup key.
const VIDEO_DIMENSION: &str = "video";

/// Analytics rows keyed by video ID.
///
/// Built from the columns the response declares, so the order YouTube returns metrics in does
/// not matter. If YouTube returns several rows for one video, the first one is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsRowSet {
    by_video: HashMap<String, WindowMetrics>,
}

impl AnalyticsRowSet {
    pub fn from_table(table: &ResultTable) -> eyre::Result<Self> {
        let column = |name: &str| {
            table.column(name).ok_or_else(|| ReportError::MissingColumn {
                column: name.to_string(),
            })
        };
        let video_column = column(VIDEO_DIMENSION)?;
        let mut metric_columns = [0; WindowMetrics::METRICS.len()];
        for (slot, metric) in metric_columns.iter_mut().zip(WindowMetrics::METRICS) {
            *slot = column(metric)?;
        }

        let mut by_video = HashMap::with_capacity(table.rows.len());
        for row in &table.rows {
            let video_id = match row.get(video_column) {
                Some(Value::String(id)) => id.clone(),
                other => eyre::bail!("analytics row has no video id: {other:?}"),
            };

            let mut values = [0.0; WindowMetrics::METRICS.len()];
            for ((value, metric), column) in values
                .iter_mut()
                .zip(WindowMetrics::METRICS)
                .zip(metric_columns)
            {
                *value = metric_value(&video_id, metric, row.get(column))?;
            }

            match by_video.entry(video_id) {
                Entry::Vacant(slot) => {
                    slot.insert(WindowMetrics::from_values(values));
                }
                Entry::Occupied(slot) => {
                    tracing::warn!(video_id = slot.key(), "ignoring duplicate analytics row");
                }
            }
        }

        Ok(Self { by_video })
    }

    pub fn get(&self, video_id: &str) -> Option<&WindowMetrics> {
        self.by_video.get(video_id)
    }

    pub fn len(&self) -> usize {
        self.by_video.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_video.is_empty()
    }
}

/// Reads one cell as `f64`, accepting JSON numbers and numeric strings.
fn metric_value(video_id: &str, metric: &'static str, cell: Option<&Value>) -> eyre::Result<f64> {
    let parsed = match cell {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ReportError::NonNumericMetric {
            video_id: video_id.to_string(),
            metric,
            value: cell.map_or_else(|| "<missing>".to_string(), Value::to_string),
        }
        .into()
    })
}

/// Queries the window-scoped metrics of `video_ids` between `start` and `end`, inclusive.
///
/// One request covers all videos. No request is made for an empty catalog.
pub async fn fetch_analytics<C: Credentials>(
    yt: &YouTubeClient<C>,
    video_ids: &[String],
    start: Date,
    end: Date,
) -> eyre::Result<AnalyticsRowSet> {
    if video_ids.is_empty() {
        tracing::debug!("no videos, skipping analytics query");
        return Ok(AnalyticsRowSet::default());
    }

    let query = ReportQuery {
        ids: "channel==MINE",
        start_date: start,
        end_date: end,
        metrics: &WindowMetrics::METRICS,
        dimensions: VIDEO_DIMENSION,
        filters: Some(format!("{VIDEO_DIMENSION}=={}", video_ids.join(","))),
    };
    let table = yt
        .query_report(&query)
        .await
        .with_context(|| format!("fetch analytics for {start}..={end}"))?;
    let rows = AnalyticsRowSet::from_table(&table).context("index analytics rows by video")?;
    tracing::info!(
        requested = video_ids.len(),
        matched = rows.len(),
        "fetched analytics"
    );
    Ok(rows)
}
