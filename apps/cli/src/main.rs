use std::{
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use termometro_core::{
    CommentExtractor, ContentType, ExtractionOutcome, KeywordClassifier, LexiconClassifier,
    RouterConfig, ScrapeOrchestrator, ScraperConfig, SentimentRouter, VideoSearchEngine,
    YtDlpCommentSource, YtDlpSearchSource, aggregate, format_comments_readable,
    format_outcomes_readable, format_stats_readable, format_summary_readable,
    format_tally_readable, format_videos_readable, parse_video_url,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "termometro=info,termometro_core=info";

/// yt-dlp is asked for this many raw comments per kept comment, since
/// filtering drops part of them.
const FETCH_FACTOR: usize = 3;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for ContentType (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliContentType {
    #[default]
    Auto,
    Video,
    Short,
}

impl From<CliContentType> for ContentType {
    fn from(cli: CliContentType) -> Self {
        match cli {
            CliContentType::Auto => ContentType::Auto,
            CliContentType::Video => ContentType::Video,
            CliContentType::Short => ContentType::Short,
        }
    }
}

#[derive(Parser)]
#[command(name = "termometro")]
#[command(about = "Scrape YouTube comments and measure their sentiment")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Search recent videos, most viewed first
    Search {
        query: String,

        /// Maximum number of videos
        #[arg(short = 'n', long)]
        max_videos: Option<usize>,

        /// Only videos uploaded within this many hours
        #[arg(long)]
        hours_back: Option<u32>,
    },

    /// Extract the comments of one video
    Comments {
        /// Video URL
        url: String,

        /// Maximum number of comments to keep
        #[arg(short = 'n', long)]
        max_comments: Option<usize>,

        /// How to build the canonical URL
        #[arg(short, long, default_value = "auto")]
        content_type: CliContentType,

        /// Keep comments in every language
        #[arg(long)]
        all_languages: bool,
    },

    /// Search and extract comments from the top videos
    Scrape {
        query: String,

        #[arg(short = 'n', long)]
        max_videos: Option<usize>,

        #[arg(short = 'c', long)]
        max_comments: Option<usize>,

        #[arg(long)]
        hours_back: Option<u32>,

        /// Classify the extracted comments
        #[arg(long)]
        analyze: bool,

        /// Count comments per political party
        #[arg(long)]
        parties: bool,
    },

    /// Classify the given texts
    Analyze {
        #[arg(required = true)]
        texts: Vec<String>,

        /// Five-level star labels instead of positive/negative/neutral
        #[arg(long)]
        full: bool,
    },

    /// Probe the sentiment service
    Health,
}

fn create_spinner(msg: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn comment_extractor(config: &ScraperConfig, max_comments: usize) -> CommentExtractor {
    let source = YtDlpCommentSource::default()
        .with_max_fetch(max_comments.saturating_mul(FETCH_FACTOR))
        .with_kill_after(config.extraction_deadline);
    CommentExtractor::from_config(Arc::new(source), config).with_max_comments(max_comments)
}

fn sentiment_router() -> Result<SentimentRouter> {
    let config = RouterConfig::from_env().context("invalid sentiment service configuration")?;
    Ok(SentimentRouter::new(config)?.with_fallback(Arc::new(LexiconClassifier::new())))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = ScraperConfig::from_env().context("invalid scraper configuration")?;
    debug!(?config, "scraper configuration loaded");

    if !cli.json {
        println!(
            "\n{}  {}\n",
            style("termometro").cyan().bold(),
            style("Comment Sentiment").dim()
        );
    }

    let total_start = Instant::now();

    match cli.command {
        Command::Search {
            query,
            max_videos,
            hours_back,
        } => {
            let max_videos = max_videos.unwrap_or(config.max_videos);
            let hours_back = hours_back.unwrap_or(config.hours_back);
            let engine = VideoSearchEngine::new(Arc::new(YtDlpSearchSource::default()));

            let spinner = create_spinner(&format!("Searching \"{}\"...", query), cli.json);
            let videos = engine.try_search(&query, max_videos, hours_back).await?;
            spinner.finish_with_message(format!(
                "{} Found {} videos {}",
                style("✓").green().bold(),
                videos.len(),
                style(format!("[{}]", format_duration(total_start.elapsed()))).dim()
            ));

            if cli.json {
                return print_json(&json!({ "query": query, "videos": videos }));
            }
            println!("\n{}", format_videos_readable(&videos));
        }

        Command::Comments {
            url,
            max_comments,
            content_type,
            all_languages,
        } => {
            let Some((video_id, detected)) = parse_video_url(&url) else {
                bail!("not a YouTube video URL: {url}");
            };
            let content_type = match ContentType::from(content_type) {
                ContentType::Auto => detected,
                explicit => explicit,
            };

            let mut config = config;
            if all_languages {
                config.language = None;
            }
            let max_comments = max_comments.unwrap_or(config.max_comments_per_video);
            let extractor = comment_extractor(&config, max_comments);

            let spinner = create_spinner("Extracting comments...", cli.json);
            let report = extractor.extract_report(&video_id, "", content_type).await;
            let status = match &report.outcome {
                ExtractionOutcome::Completed => style("✓").green().bold(),
                ExtractionOutcome::TimedOut => style("⏱").yellow().bold(),
                ExtractionOutcome::Failed(_) => style("✗").red().bold(),
            };
            spinner.finish_with_message(format!(
                "{} {} comments kept, {} filtered {}",
                status,
                report.comments.len(),
                report.filtered,
                style(format!("[{}]", format_duration(report.elapsed))).dim()
            ));

            if cli.json {
                return print_json(&json!({
                    "video_id": video_id,
                    "outcome": format!("{:?}", report.outcome),
                    "filtered": report.filtered,
                    "comments": report.comments,
                }));
            }
            if let ExtractionOutcome::Failed(reason) = &report.outcome {
                eprintln!("{} {}", style("Error:").red().bold(), reason);
            }
            println!("\n{}", format_comments_readable(&report.comments));
        }

        Command::Scrape {
            query,
            max_videos,
            max_comments,
            hours_back,
            analyze,
            parties,
        } => {
            let max_videos = max_videos.unwrap_or(config.max_videos);
            let max_comments = max_comments.unwrap_or(config.max_comments_per_video);
            let hours_back = hours_back.unwrap_or(config.hours_back);

            let orchestrator = ScrapeOrchestrator::from_config(
                VideoSearchEngine::new(Arc::new(YtDlpSearchSource::default())),
                comment_extractor(&config, max_comments),
                &config,
            );

            let spinner = create_spinner(&format!("Scraping \"{}\"...", query), cli.json);
            let (comments, stats) = orchestrator
                .run(&query, max_videos, max_comments, hours_back)
                .await;
            spinner.finish_with_message(format!(
                "{} Scraped {} comments from {} videos {}",
                style("✓").green().bold(),
                comments.len(),
                stats.videos_processed,
                style(format!("[{}]", format_duration(total_start.elapsed()))).dim()
            ));

            let tally = parties.then(|| KeywordClassifier::political_parties().tally(&comments));

            let sentiment = if analyze && !comments.is_empty() {
                let router = sentiment_router()?;
                let texts: Vec<String> = comments.iter().map(|c| c.text.clone()).collect();
                let spinner = create_spinner("Analyzing sentiment...", cli.json);
                let outcomes = router.analyze(&texts, true).await?;
                spinner.finish_with_message(format!(
                    "{} Analyzed {} comments",
                    style("✓").green().bold(),
                    outcomes.len()
                ));
                Some(aggregate(&outcomes))
            } else {
                None
            };

            if cli.json {
                return print_json(&json!({
                    "stats": stats,
                    "comments": comments,
                    "parties": tally,
                    "sentiment": sentiment,
                }));
            }

            println!("{}", style("─".repeat(60)).dim());
            println!("{}", format_stats_readable(&stats));
            if let Some(tally) = &tally {
                println!("{}", format_tally_readable(tally));
            }
            if let Some(summary) = &sentiment {
                println!("{}", format_summary_readable(summary));
            }
        }

        Command::Analyze { texts, full } => {
            let router = sentiment_router()?;
            let spinner = create_spinner("Analyzing sentiment...", cli.json);
            let outcomes = router.analyze(&texts, !full).await?;
            spinner.finish_with_message(format!(
                "{} Analyzed {} texts {}",
                style("✓").green().bold(),
                outcomes.len(),
                style(format!("[{}]", format_duration(total_start.elapsed()))).dim()
            ));

            let summary = aggregate(&outcomes);
            if cli.json {
                return print_json(&json!({ "results": outcomes, "statistics": summary }));
            }
            println!("\n{}", format_outcomes_readable(&outcomes));
            println!("{}", format_summary_readable(&summary));
        }

        Command::Health => {
            let router = sentiment_router()?;
            let healthy = router.health().await;
            let url = &router.config().service_url;

            if cli.json {
                return print_json(&json!({ "service_url": url, "healthy": healthy }));
            }
            if healthy {
                println!("{} {} is healthy", style("✓").green().bold(), style(url).cyan());
            } else {
                println!(
                    "{} {} is unavailable, local fallback will be used",
                    style("✗").red().bold(),
                    style(url).cyan()
                );
            }
            return Ok(());
        }
    }

    println!(
        "{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );

    Ok(())
}
