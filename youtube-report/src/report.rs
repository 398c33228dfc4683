//! CSV output.
//!
//! Reports are meant to be opened by double-clicking them in a spreadsheet application, which is
//! why they start with a UTF-8 byte order mark by default: without it, Excel guesses a legacy
//! code page and mangles non-ASCII titles.

use crate::record::{RunMode, VideoRecord};
use eyre::Context;
use jiff::Zoned;
use std::path::PathBuf;

const BYTE_ORDER_MARK: &[u8] = b"\xEF\xBB\xBF";

/// Language of the header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Labels {
    #[default]
    #[value(name = "en")]
    English,
    #[value(name = "ja")]
    Japanese,
}

impl Labels {
    /// Headers of the columns every report has.
    fn catalog(self) -> [&'static str; 8] {
        match self {
            Labels::English => [
                "Video ID",
                "Title",
                "Total Views",
                "Total Likes",
                "Total Dislikes",
                "Total Favorites",
                "Total Comments",
                "Published At",
            ],
            Labels::Japanese => [
                "ビデオID",
                "タイトル",
                "総再生数",
                "総高評価数",
                "総低評価数",
                "総お気に入り数",
                "総コメント数",
                "公開日時",
            ],
        }
    }

    /// Headers of the window metric columns, in [`WindowMetrics::METRICS`] order.
    ///
    /// [`WindowMetrics::METRICS`]: crate::record::WindowMetrics::METRICS
    fn window(self) -> [&'static str; 8] {
        match self {
            Labels::English => [
                "Views",
                "Estimated Minutes Watched",
                "Average View Duration (s)",
                "Comments",
                "Likes",
                "Dislikes",
                "Subscribers Gained",
                "Subscribers Lost",
            ],
            Labels::Japanese => [
                "期間内再生数",
                "期間内再生時間(分)",
                "期間内平均視聴時間(秒)",
                "期間内コメント数",
                "期間内高評価数",
                "期間内低評価数",
                "期間内登録回数",
                "期間内登録解除回数",
            ],
        }
    }

    /// The header row for `mode`.
    pub fn header(self, mode: &RunMode) -> Vec<&'static str> {
        let mut header = self.catalog().to_vec();
        if mode.is_report() {
            header.extend(self.window());
        }
        header
    }
}

/// Everything that shapes the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    pub out_dir: PathBuf,
    pub byte_order_mark: bool,
    pub labels: Labels,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            byte_order_mark: true,
            labels: Labels::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportWriter {
    config: WriterConfig,
}

impl ReportWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    /// `20240131235959_youtube_data.csv`, with `(start_end)` before the extension for reports.
    pub fn file_name(mode: &RunMode, now: &Zoned) -> String {
        let stamp = now.strftime("%Y%m%d%H%M%S");
        match mode {
            RunMode::Catalog => format!("{stamp}_youtube_data.csv"),
            RunMode::Report { start, end } => format!("{stamp}_youtube_data({start}_{end}).csv"),
        }
    }

    /// Serializes `records` into a complete CSV document.
    ///
    /// Window metric columns are only written for [`RunMode::Report`]; a record without window
    /// metrics then contributes zeros.
    pub fn render(&self, records: &[VideoRecord], mode: &RunMode) -> eyre::Result<Vec<u8>> {
        let mut out = Vec::new();
        if self.config.byte_order_mark {
            out.extend_from_slice(BYTE_ORDER_MARK);
        }

        let mut csv = csv::Writer::from_writer(&mut out);
        csv.write_record(self.config.labels.header(mode))
            .context("write CSV header")?;
        for record in records {
            csv.write_record(row(record, mode))
                .with_context(|| format!("write CSV row for video {}", record.id))?;
        }
        csv.flush().context("flush CSV writer")?;
        drop(csv);

        Ok(out)
    }

    /// Writes the report into the output directory and returns its path.
    ///
    /// The document is rendered in full before the file is created, so a failure never leaves a
    /// truncated report behind.
    pub async fn write(&self, records: &[VideoRecord], mode: &RunMode) -> eyre::Result<PathBuf> {
        let bytes = self.render(records, mode)?;
        let path = self
            .config
            .out_dir
            .join(Self::file_name(mode, &Zoned::now()));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write report to {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "wrote report"
        );
        Ok(path)
    }
}

fn row(record: &VideoRecord, mode: &RunMode) -> Vec<String> {
    let lifetime = &record.lifetime;
    let mut row = vec![
        record.id.clone(),
        record.title.clone(),
        lifetime.views.to_string(),
        lifetime.likes.to_string(),
        lifetime.dislikes.to_string(),
        lifetime.favorites.to_string(),
        lifetime.comments.to_string(),
        record.published_at.to_string(),
    ];
    if mode.is_report() {
        let window = record.window.unwrap_or_default();
        row.extend(window.values().iter().map(f64::to_string));
    }
    row
}
