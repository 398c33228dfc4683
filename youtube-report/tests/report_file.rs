//! End-to-end runs that write a report to disk.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use youtube_report::{ApiKey, Labels, ReportWriter, RunMode, WriterConfig, YouTubeClient};

async fn mock_channel_with_three_videos(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{
                "id": "UC1",
                "contentDetails": { "relatedPlaylists": { "uploads": "UU1" } }
            }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .and(query_param("playlistId", "UU1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "contentDetails": { "videoId": "c" } },
                { "contentDetails": { "videoId": "a" } },
                { "contentDetails": { "videoId": "b" } }
            ],
            "pageInfo": { "totalResults": 3, "resultsPerPage": 50 }
        })))
        .expect(1)
        .mount(server)
        .await;
    for id in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", id))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": id,
                    "snippet": { "title": format!("タイトル {id}"), "publishedAt": "2023-12-24T18:30:00Z" },
                    "statistics": { "viewCount": "42", "likeCount": "4", "commentCount": "1" }
                }]
            })))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn catalog_run_writes_bom_prefixed_csv() {
    let server = MockServer::start().await;
    mock_channel_with_three_videos(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let yt = YouTubeClient::with_base_urls(ApiKey::new("k"), server.uri(), server.uri());
    let writer = ReportWriter::new(WriterConfig {
        out_dir: dir.path().to_path_buf(),
        ..Default::default()
    });
    let path = youtube_report::run(&yt, "UC1", &RunMode::Catalog, &writer)
        .await
        .unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.ends_with("_youtube_data.csv"), "{name}");
    assert_eq!(name.len(), "YYYYmmddHHMMSS_youtube_data.csv".len());

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    let body = std::str::from_utf8(&bytes[3..]).unwrap();
    let lines: Vec<_> = body.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Video ID,Title,"));
    let ids: Vec<_> = lines[1..]
        .iter()
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert_eq!(ids, ["c", "a", "b"]);
    assert_eq!(lines[2], "a,タイトル a,42,4,0,0,1,2023-12-24T18:30:00Z");
}

#[tokio::test]
async fn report_run_names_file_after_date_range() {
    let server = MockServer::start().await;
    mock_channel_with_three_videos(&server).await;
    Mock::given(method("GET"))
        .and(path("/reports"))
        .and(query_param("filters", "video==c,a,b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "columnHeaders": [
                { "name": "video", "columnType": "DIMENSION", "dataType": "STRING" },
                { "name": "views", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "estimatedMinutesWatched", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "averageViewDuration", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "comments", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "likes", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "dislikes", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "subscribersGained", "columnType": "METRIC", "dataType": "INTEGER" },
                { "name": "subscribersLost", "columnType": "METRIC", "dataType": "INTEGER" }
            ],
            "rows": [["a", 9, 18, 120, 1, 2, 0, 1, 0]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let yt = YouTubeClient::with_base_urls(ApiKey::new("k"), server.uri(), server.uri());
    let writer = ReportWriter::new(WriterConfig {
        out_dir: dir.path().to_path_buf(),
        byte_order_mark: true,
        labels: Labels::Japanese,
    });
    let mode = RunMode::Report {
        start: jiff::civil::date(2024, 1, 1),
        end: jiff::civil::date(2024, 1, 31),
    };
    let path = youtube_report::run(&yt, "UC1", &mode, &writer).await.unwrap();

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.ends_with("_youtube_data(2024-01-01_2024-01-31).csv"), "{name}");

    let bytes = std::fs::read(&path).unwrap();
    let mut reader = csv::Reader::from_reader(&bytes[3..]);
    assert_eq!(reader.headers().unwrap().len(), 16);
    assert_eq!(&reader.headers().unwrap()[8], "期間内再生数");
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[1][0], "a");
    assert_eq!(&rows[1][8], "9");
    assert_eq!(&rows[1][10], "120");
    assert!(rows[0].iter().skip(8).all(|cell| cell == "0"));
}

#[tokio::test]
async fn failed_run_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backendError"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let yt = YouTubeClient::with_base_urls(ApiKey::new("k"), server.uri(), server.uri());
    let writer = ReportWriter::new(WriterConfig {
        out_dir: dir.path().to_path_buf(),
        ..Default::default()
    });
    assert!(
        youtube_report::run(&yt, "UC1", &RunMode::Catalog, &writer)
            .await
            .is_err()
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
