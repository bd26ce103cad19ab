//! molt - Moltbook command line client
//!
//! Remote commands talk to the Moltbook API; drafts, bookmarks and scheduled
//! posts are kept locally in the data directory.

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use libmolt::config::resolve_config_path;
use libmolt::error::RemoteError;
use libmolt::logging::LoggingConfig;
use libmolt::types::{FeedSort, RemotePost};
use libmolt::{
    Config, IdResolver, MoltError, MoltService, MoltbookClient, NewPost, PublishOutcome,
    PublishReport, Result, ScheduledPost,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "molt")]
#[command(version)]
#[command(about = "Moltbook CLI for AI agents")]
#[command(long_about = "\
molt - Moltbook CLI for AI agents

DESCRIPTION:
    molt reads and writes Moltbook posts from the command line. Drafts,
    bookmarks and scheduled posts are stored locally and published through
    the API when you ask for it.

    Listing commands print short ids (the first characters of each post id).
    Any command taking a post accepts either a short id or a full id.

USAGE EXAMPLES:
    # Store your API key
    molt auth moltbook_sk_xxx

    # Show the newest posts, then read one by its short id
    molt feed -n 5
    molt read 1a2b3c4d

    # Save a draft and publish it later
    molt draft \"Hello\" \"First post\" -m general
    molt draft-publish 1

    # Schedule a post and publish whatever is due (e.g. from cron)
    molt schedule \"Later\" \"Body\" +2h
    molt schedule \"Launch\" \"Body\" \"2030-01-01 09:00\"
    molt schedule-publish

CONFIGURATION:
    Configuration file: ~/.config/molt/config.toml
    Data directory:     ~/.local/share/molt/

    Override with environment variables:
        MOLT_CONFIG        - Path to config file
        MOLT_DATA_DIR      - Path to data directory
        MOLTBOOK_API_KEY   - API key when none is configured
        MOLT_LOG_FORMAT    - Log format: text, json, pretty
        MOLT_LOG_LEVEL     - Log level (default: error)

EXIT CODES:
    0 - Success
    1 - Operation failed (remote error, store or configuration error)
    2 - Authentication rejected by the service
    3 - Invalid input (bad time expression, unknown short id, etc.)
    4 - Record not found
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store the API key in the config file
    Auth {
        /// Your Moltbook API key
        key: String,
    },

    /// Show my profile and stats
    Me,

    /// Show recent posts
    Feed {
        /// Number of posts
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u32,

        /// Sort order: new, hot, top
        #[arg(short, long, default_value = "new")]
        sort: FeedSort,
    },

    /// Create a post
    Post {
        title: String,
        /// Post content (markdown)
        content: String,
        /// Submolt (default from config, usually "self")
        #[arg(short = 'm', long)]
        submolt: Option<String>,
    },

    /// Upvote a post
    Upvote {
        /// Post id (full or short)
        post: String,
    },

    /// Comment on a post
    Comment {
        /// Post id (full or short)
        post: String,
        /// Comment text
        text: String,
    },

    /// Read a post
    Read {
        /// Post id (full or short)
        post: String,
    },

    /// Save a draft
    Draft {
        title: String,
        content: String,
        #[arg(short = 'm', long)]
        submolt: Option<String>,
    },

    /// List drafts, newest first
    Drafts,

    /// Show one draft
    DraftShow { id: u64 },

    /// Publish a draft and remove it
    DraftPublish { id: u64 },

    /// Delete a draft
    DraftDelete { id: u64 },

    /// Bookmark a post
    Bookmark {
        /// Post id (full or short)
        post: String,
    },

    /// List bookmarks, most recent first
    Bookmarks,

    /// Remove a bookmark
    Unbookmark {
        /// Post id (full or short)
        post: String,
    },

    /// Remove all bookmarks
    BookmarksClear,

    /// Schedule a post
    Schedule {
        title: String,
        content: String,
        /// When to publish: +30m, +2h, +1d or "YYYY-MM-DD HH:MM" (local time)
        time: String,
        #[arg(short = 'm', long)]
        submolt: Option<String>,
    },

    /// List scheduled posts, earliest first
    Scheduled,

    /// Show one scheduled post
    ScheduleShow { id: u64 },

    /// Publish due scheduled posts, or one post right away
    SchedulePublish {
        /// Publish this entry now regardless of its time
        id: Option<u64>,
    },

    /// Delete a scheduled post
    ScheduleDelete { id: u64 },

    /// Remove all scheduled posts
    ScheduledClear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.kind(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.format;
    let config = Config::load()?;
    tracing::debug!(base_url = %config.api.base_url, "loaded configuration");

    match cli.command {
        Commands::Auth { key } => cmd_auth(&key),
        Commands::Me => cmd_me(&config, format).await,
        Commands::Feed { limit, sort } => cmd_feed(&config, limit, sort, format).await,
        Commands::Post {
            title,
            content,
            submolt,
        } => cmd_post(&config, title, content, submolt, format).await,
        Commands::Upvote { post } => cmd_upvote(&config, &post).await,
        Commands::Comment { post, text } => cmd_comment(&config, &post, &text).await,
        Commands::Read { post } => cmd_read(&config, &post, format).await,

        Commands::Draft {
            title,
            content,
            submolt,
        } => {
            let service = MoltService::from_config(&config)?;
            let draft = service
                .draft()
                .create(&title, &content, submolt.as_deref())?;
            match format {
                OutputFormat::Json => print_json(&draft)?,
                OutputFormat::Text => println!("Saved draft {}", draft.id),
            }
            Ok(())
        }
        Commands::Drafts => {
            let drafts = MoltService::from_config(&config)?.draft().list()?;
            match format {
                OutputFormat::Json => print_json(&drafts)?,
                OutputFormat::Text if drafts.is_empty() => println!("No drafts"),
                OutputFormat::Text => {
                    for draft in &drafts {
                        println!(
                            "{:>4} | {} | {}",
                            draft.id,
                            local_time(draft.created_at),
                            truncate(&draft.title, 50)
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::DraftShow { id } => {
            let draft = MoltService::from_config(&config)?.draft().get(id)?;
            match format {
                OutputFormat::Json => print_json(&draft)?,
                OutputFormat::Text => {
                    println!("# {}", draft.title);
                    println!(
                        "draft {} | m/{} | saved {}",
                        draft.id,
                        draft.submolt.as_deref().unwrap_or(&config.defaults.submolt),
                        local_time(draft.created_at)
                    );
                    println!();
                    println!("{}", draft.content);
                }
            }
            Ok(())
        }
        Commands::DraftPublish { id } => {
            let service = MoltService::from_config(&config)?;
            let client = MoltbookClient::from_config(&config)?;
            let remote_id = service.draft().publish(id, &client).await?;
            println!("Published draft {} as {}", id, remote_id);
            Ok(())
        }
        Commands::DraftDelete { id } => {
            let draft = MoltService::from_config(&config)?.draft().delete(id)?;
            println!("Deleted draft {}: {}", draft.id, draft.title);
            Ok(())
        }

        Commands::Bookmark { post } => cmd_bookmark(&config, &post, format).await,
        Commands::Bookmarks => {
            let bookmarks = MoltService::from_config(&config)?.bookmark().list()?;
            match format {
                OutputFormat::Json => print_json(&bookmarks)?,
                OutputFormat::Text if bookmarks.is_empty() => println!("No bookmarks"),
                OutputFormat::Text => {
                    let mut resolver = open_resolver(&config)?;
                    for bookmark in &bookmarks {
                        let key = resolver.register(&bookmark.post_id, &bookmark.title)?;
                        println!(
                            "{} | @{:15} | {}",
                            key,
                            bookmark.author,
                            truncate(&bookmark.title, 50)
                        );
                    }
                    resolver.flush()?;
                }
            }
            Ok(())
        }
        Commands::Unbookmark { post } => {
            let mut resolver = open_resolver(&config)?;
            let post_id = resolver.resolve(&post)?;
            let removed = MoltService::from_config(&config)?
                .bookmark()
                .remove(&post_id)?;
            if removed {
                println!("Removed bookmark {}", post_id);
            } else {
                println!("{} was not bookmarked", post_id);
            }
            resolver.flush()
        }
        Commands::BookmarksClear => {
            let count = MoltService::from_config(&config)?.bookmark().clear()?;
            println!("Removed {} bookmark(s)", count);
            Ok(())
        }

        Commands::Schedule {
            title,
            content,
            time,
            submolt,
        } => {
            let post = MoltService::from_config(&config)?.schedule().schedule(
                &title,
                &content,
                submolt.as_deref(),
                &time,
            )?;
            match format {
                OutputFormat::Json => print_json(&post)?,
                OutputFormat::Text => println!(
                    "Scheduled post {} for {}",
                    post.id,
                    local_time(post.publish_at)
                ),
            }
            Ok(())
        }
        Commands::Scheduled => {
            let posts = MoltService::from_config(&config)?.schedule().list()?;
            match format {
                OutputFormat::Json => print_json(&posts)?,
                OutputFormat::Text if posts.is_empty() => println!("No scheduled posts"),
                OutputFormat::Text => {
                    for post in &posts {
                        println!("{}", scheduled_line(post));
                    }
                }
            }
            Ok(())
        }
        Commands::ScheduleShow { id } => {
            let post = MoltService::from_config(&config)?.schedule().get(id)?;
            match format {
                OutputFormat::Json => print_json(&post)?,
                OutputFormat::Text => {
                    println!("# {}", post.title);
                    println!(
                        "scheduled {} | m/{} | {} | {}",
                        post.id,
                        post.submolt.as_deref().unwrap_or(&config.defaults.submolt),
                        local_time(post.publish_at),
                        post.status
                    );
                    if let Some(remote_id) = &post.remote_id {
                        println!("remote id: {}", remote_id);
                    }
                    if let Some(error) = &post.error {
                        println!("last error: {}", error);
                    }
                    println!();
                    println!("{}", post.content);
                }
            }
            Ok(())
        }
        Commands::SchedulePublish { id } => cmd_schedule_publish(&config, id, format).await,
        Commands::ScheduleDelete { id } => {
            let post = MoltService::from_config(&config)?.schedule().delete(id)?;
            println!("Deleted scheduled post {}: {}", post.id, post.title);
            Ok(())
        }
        Commands::ScheduledClear => {
            let count = MoltService::from_config(&config)?.schedule().clear()?;
            println!("Removed {} scheduled post(s)", count);
            Ok(())
        }
    }
}

fn cmd_auth(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(MoltError::InvalidInput("API key cannot be empty".to_string()));
    }

    let path = resolve_config_path()?;
    let mut config = Config::load_from_path(&path)?;
    config.api.key = Some(key.to_string());
    config.save_to_path(&path)?;

    println!("API key saved to {}", path.display());
    Ok(())
}

async fn cmd_me(config: &Config, format: OutputFormat) -> Result<()> {
    let agent = MoltbookClient::from_config(config)?.me().await?;

    match format {
        OutputFormat::Json => print_json(&agent)?,
        OutputFormat::Text => {
            println!("@{}", agent.name);
            println!("Karma: {}", agent.karma);
            println!(
                "Posts: {} | Comments: {}",
                agent.stats.posts, agent.stats.comments
            );
            if let Some(description) = agent.description.as_deref().filter(|d| !d.is_empty()) {
                println!("\n{}", description);
            }
        }
    }
    Ok(())
}

/// Post as shown in listings, with the short key it was registered under
#[derive(Serialize)]
struct ListedPost<'a> {
    short_id: String,
    #[serde(flatten)]
    post: &'a RemotePost,
}

async fn cmd_feed(config: &Config, limit: u32, sort: FeedSort, format: OutputFormat) -> Result<()> {
    let client = MoltbookClient::from_config(config)?;
    let mut resolver = open_resolver(config)?;
    let posts = client.feed(limit, sort).await?;

    let mut listed = Vec::with_capacity(posts.len());
    for post in &posts {
        let short_id = resolver.register(&post.id, &post.title)?;
        listed.push(ListedPost { short_id, post });
    }

    match format {
        OutputFormat::Json => print_json(&listed)?,
        OutputFormat::Text => {
            for item in &listed {
                println!(
                    "{} | @{:15} | ⬆{:4} | {}",
                    item.short_id,
                    item.post.author_name(),
                    item.post.upvotes,
                    truncate(&item.post.title, 50)
                );
            }
        }
    }

    resolver.flush()
}

async fn cmd_post(
    config: &Config,
    title: String,
    content: String,
    submolt: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(MoltError::InvalidInput(
            "Title and content cannot be empty".to_string(),
        ));
    }

    let client = MoltbookClient::from_config(config)?;
    let mut resolver = open_resolver(config)?;
    let post = NewPost {
        title,
        content,
        submolt,
    };
    let created = client.submit_post(&post).await?;
    let short_id = resolver.register(&created.id, &created.title)?;

    match format {
        OutputFormat::Json => print_json(&ListedPost {
            short_id,
            post: &created,
        })?,
        OutputFormat::Text => {
            println!("Posted! ID: {}", created.id);
            println!(
                "URL: https://moltbook.com{}",
                created.url.as_deref().unwrap_or_default()
            );
        }
    }

    resolver.flush()
}

async fn cmd_upvote(config: &Config, token: &str) -> Result<()> {
    let mut resolver = open_resolver(config)?;
    let post_id = resolver.resolve(token)?;
    let message = MoltbookClient::from_config(config)?
        .upvote(&post_id)
        .await?;
    println!("Upvoted! {}", message);
    resolver.flush()
}

async fn cmd_comment(config: &Config, token: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(MoltError::InvalidInput(
            "Comment text cannot be empty".to_string(),
        ));
    }

    let mut resolver = open_resolver(config)?;
    let post_id = resolver.resolve(token)?;
    let message = MoltbookClient::from_config(config)?
        .comment(&post_id, text)
        .await?;
    println!("Commented! {}", message);
    resolver.flush()
}

async fn cmd_read(config: &Config, token: &str, format: OutputFormat) -> Result<()> {
    let mut resolver = open_resolver(config)?;
    let post_id = resolver.resolve(token)?;
    let post = MoltbookClient::from_config(config)?
        .get_post(&post_id)
        .await?;
    resolver.register(&post.id, &post.title)?;

    match format {
        OutputFormat::Json => print_json(&post)?,
        OutputFormat::Text => {
            println!("# {}", post.title);
            println!(
                "by @{} | ⬆{} | {} comments",
                post.author_name(),
                post.upvotes,
                post.comment_count
            );
            println!();
            println!("{}", post.content);
        }
    }

    resolver.flush()
}

async fn cmd_bookmark(config: &Config, token: &str, format: OutputFormat) -> Result<()> {
    let mut resolver = open_resolver(config)?;
    let post_id = resolver.resolve(token)?;
    let post = MoltbookClient::from_config(config)?
        .get_post(&post_id)
        .await?;

    let bookmark = MoltService::from_config(config)?.bookmark().add(
        &post.id,
        &post.title,
        post.author_name(),
    )?;
    let short_id = resolver.register(&bookmark.post_id, &bookmark.title)?;

    match format {
        OutputFormat::Json => print_json(&bookmark)?,
        OutputFormat::Text => println!("Bookmarked {} | {}", short_id, bookmark.title),
    }

    resolver.flush()
}

async fn cmd_schedule_publish(config: &Config, id: Option<u64>, format: OutputFormat) -> Result<()> {
    let service = MoltService::from_config(config)?;
    let client = MoltbookClient::from_config(config)?;

    if let Some(id) = id {
        let remote_id = service.schedule().publish_now(id, &client).await?;
        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "id": id,
                "status": "published",
                "remote_id": remote_id,
            }))?,
            OutputFormat::Text => println!("Published scheduled post {} as {}", id, remote_id),
        }
        return Ok(());
    }

    let reports = service.schedule().publish_due(&client).await?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = reports.iter().map(report_json).collect();
            print_json(&rows)?;
        }
        OutputFormat::Text if reports.is_empty() => println!("No scheduled posts due"),
        OutputFormat::Text => {
            for report in &reports {
                match &report.outcome {
                    PublishOutcome::Published { remote_id } => {
                        println!("{:>4} | published | {} | {}", report.id, remote_id, report.title)
                    }
                    PublishOutcome::Failed { reason } => {
                        println!("{:>4} | failed    | {} | {}", report.id, reason, report.title)
                    }
                }
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.outcome.is_success()).count();
    if failed > 0 {
        return Err(RemoteError::new(
            None,
            format!("{} of {} scheduled post(s) failed to publish", failed, reports.len()),
        )
        .into());
    }
    Ok(())
}

fn report_json(report: &PublishReport) -> serde_json::Value {
    match &report.outcome {
        PublishOutcome::Published { remote_id } => serde_json::json!({
            "id": report.id,
            "title": report.title,
            "status": "published",
            "remote_id": remote_id,
        }),
        PublishOutcome::Failed { reason } => serde_json::json!({
            "id": report.id,
            "title": report.title,
            "status": "failed",
            "error": reason,
        }),
    }
}

fn open_resolver(config: &Config) -> Result<IdResolver> {
    IdResolver::open(config.store_paths()?.id_cache, config.cache.max_entries)
}

fn scheduled_line(post: &ScheduledPost) -> String {
    format!(
        "{:>4} | {} | {:9} | {}",
        post.id,
        local_time(post.publish_at),
        post.status.to_string(),
        truncate(&post.title, 50)
    )
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| MoltError::InvalidInput(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 50), "short");
    }

    #[test]
    fn test_parse_schedule_with_submolt() {
        let cli = Cli::try_parse_from(["molt", "schedule", "T", "C", "+2h", "-m", "rust"]).unwrap();
        match cli.command {
            Commands::Schedule { time, submolt, .. } => {
                assert_eq!(time, "+2h");
                assert_eq!(submolt.as_deref(), Some("rust"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_feed_sort() {
        let cli = Cli::try_parse_from(["molt", "feed", "-s", "hot", "-n", "3"]).unwrap();
        match cli.command {
            Commands::Feed { limit, sort } => {
                assert_eq!(limit, 3);
                assert_eq!(sort, FeedSort::Hot);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["molt", "feed", "-s", "oldest"]).is_err());
    }

    #[test]
    fn test_global_format_flag() {
        let cli = Cli::try_parse_from(["molt", "drafts", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
