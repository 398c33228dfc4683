use clap::{Parser, ValueEnum};
use eyre::Context;
use jiff::civil::Date;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_report::oauth::OAuthManager;
use youtube_report::{
    ApiKey, Config, Labels, OAuthToken, ReportWriter, RunMode, WriterConfig, YouTubeClient,
};

/// Export a YouTube channel's videos and their statistics to CSV.
///
/// Without dates, writes every upload with its lifetime counters. With START and END, also
/// includes YouTube Analytics metrics for that date range (inclusive).
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// How to authenticate against the YouTube APIs.
    #[arg(short, long, value_enum, default_value_t = AuthMode::Oauth)]
    auth: AuthMode,

    /// First day of the analytics window (YYYY-MM-DD).
    #[arg(requires = "end")]
    start: Option<Date>,

    /// Last day of the analytics window (YYYY-MM-DD).
    end: Option<Date>,

    /// Path to the run configuration.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory the report is written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Language of the CSV header row.
    #[arg(long, value_enum, default_value_t = Labels::English)]
    labels: Labels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AuthMode {
    /// Developer API key from config.json.
    Api,
    /// Sign in as the channel owner.
    Oauth,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("{e:?}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> eyre::Result<()> {
    let config = Config::load(&args.config).await?;
    let mode = match (args.start, args.end) {
        (Some(start), Some(end)) => RunMode::Report { start, end },
        _ => RunMode::Catalog,
    };
    let writer = ReportWriter::new(WriterConfig {
        out_dir: args.out_dir,
        byte_order_mark: true,
        labels: args.labels,
    });

    let path = match args.auth {
        AuthMode::Api => {
            let yt = YouTubeClient::new(ApiKey::new(config.developer_key()?));
            youtube_report::run(&yt, &config.channel_id, &mode, &writer).await?
        }
        AuthMode::Oauth => {
            let oauth_manager = OAuthManager::from_client_secret_file(&config.client_secret_file)
                .await
                .context("load OAuth client")?;
            let token = OAuthToken::acquire(oauth_manager, &config.token_file)
                .await
                .context("obtain OAuth token")?;
            let yt = YouTubeClient::new(token);
            youtube_report::run(&yt, &config.channel_id, &mode, &writer).await?
        }
    };

    println!("{}", path.display());
    Ok(())
}
