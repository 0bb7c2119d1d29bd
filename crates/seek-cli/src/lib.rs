//! Command-line interface for seek.

pub mod discover;
pub mod io;
pub mod prompts;
pub mod review_pr;
pub mod watch;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use seek_config::Config;
use seek_index::RepoFilter;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::discover::{find_repo_root, format_matches, walk_options, ContextIndex};
use crate::io::ConsoleIo;
use crate::watch::{AiCommentTracker, FileWatcher};

#[derive(Parser, Debug)]
#[command(name = "seek")]
#[command(about = "Incremental context discovery for coding assistants", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository root (defaults to the git root of the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Extra configuration file, applied over the user and project files
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose status output and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring the context index in line with the repository
    Sync(SyncArgs),

    /// Retrieve the most relevant indexed context for a query
    Query(QueryArgs),

    /// Print a review prompt for a GitHub pull request
    #[command(name = "review-pr")]
    ReviewPr(ReviewPrArgs),

    /// Watch for "AI" comments and print prompts for them
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Files to index; an empty list walks the whole repository
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query text
    pub text: String,

    /// Number of matches (defaults to discover.top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Sync the whole repository before querying
    #[arg(long)]
    pub refresh: bool,

    /// Print matches as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ReviewPrArgs {
    /// PR number or URL
    #[arg(default_value = "")]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Also re-sync the index after each batch of changes
    #[arg(long)]
    pub sync: bool,
}

/// Parse arguments and run the selected command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir().context("Cannot read the current directory")?;
    let start = cli.root.clone().unwrap_or(cwd);
    let repo_root = find_repo_root(&start).await;
    debug!("Repository root: {:?}", repo_root);

    let mut config = Config::load(Some(&repo_root), cli.config.as_deref())?;
    if cli.verbose {
        config.discover.verbose = true;
    }

    match cli.command {
        Commands::Sync(args) => run_sync(&config, &repo_root, &args.files).await,
        Commands::Query(args) => run_query(&config, &repo_root, args).await,
        Commands::ReviewPr(args) => run_review_pr(&config, &repo_root, &args.id).await,
        Commands::Watch(args) => run_watch(&config, &repo_root, args.sync).await,
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` enables debug for seek crates.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,seek=debug,seek_cli=debug,seek_index=debug,seek_config=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn open_index(config: &Config, repo_root: &Path, io: ConsoleIo) -> Result<ContextIndex> {
    let mut index = ContextIndex::from_config(&config.discover, repo_root, Arc::new(io))?;
    index.load_or_create().await;
    Ok(index)
}

async fn run_sync(config: &Config, repo_root: &Path, files: &[PathBuf]) -> Result<()> {
    let mut index = open_index(config, repo_root, ConsoleIo::new(false)).await?;
    index
        .sync(files, repo_root)
        .await
        .context("Failed to sync the context index")?;
    Ok(())
}

async fn run_query(config: &Config, repo_root: &Path, args: QueryArgs) -> Result<()> {
    let io = ConsoleIo::new(args.json);
    let mut index = open_index(config, repo_root, io).await?;

    if args.refresh {
        index
            .sync(&[], repo_root)
            .await
            .context("Failed to sync the context index")?;
    }

    let top_k = args.top_k.unwrap_or(config.discover.top_k);
    let matches = index
        .query(&args.text, top_k)
        .await
        .context("Query failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
    } else {
        print!("{}", format_matches(&matches));
    }
    Ok(())
}

async fn run_review_pr(config: &Config, repo_root: &Path, id: &str) -> Result<()> {
    let io = ConsoleIo::new(false);
    let checklist = config.review.checklist_file(repo_root)?;
    let prompt = review_pr::review_pr(repo_root, id, &checklist, &io).await?;
    println!("{}", prompt);
    Ok(())
}

async fn run_watch(config: &Config, repo_root: &Path, sync: bool) -> Result<()> {
    let io = ConsoleIo::new(false);
    let filter = RepoFilter::new(repo_root, walk_options(&config.discover))?;

    let mut index = if sync {
        Some(open_index(config, repo_root, io).await?)
    } else {
        None
    };

    let mut watcher = FileWatcher::new(
        repo_root.to_path_buf(),
        Duration::from_millis(config.watch.debounce_ms),
        filter,
    );
    let mut batches = watcher.start()?;
    let mut tracker = AiCommentTracker::new(repo_root);
    io.tool_output(&format!(
        "Watching {} for AI comments (Ctrl-C to stop)",
        repo_root.display()
    ));

    watch_loop(
        &mut batches,
        &mut tracker,
        index.as_mut(),
        repo_root,
        io,
        tokio::signal::ctrl_c(),
        |prompt| println!("{}", prompt),
    )
    .await;

    watcher.stop();
    Ok(())
}

/// Process change batches until the channel closes or `shutdown` resolves.
/// The shutdown future lives across iterations, so a signal that arrives
/// while a batch is being handled stops the loop before the next one.
async fn watch_loop<F>(
    batches: &mut mpsc::Receiver<Vec<PathBuf>>,
    tracker: &mut AiCommentTracker,
    mut index: Option<&mut ContextIndex>,
    repo_root: &Path,
    io: ConsoleIo,
    shutdown: F,
    mut emit: impl FnMut(String),
) where
    F: Future,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,
            batch = batches.recv() => {
                let Some(paths) = batch else { break };
                debug!("{} files changed", paths.len());
                for path in paths {
                    tracker.add_changed(path);
                }
                if let Some(prompt) = tracker.process_changes() {
                    emit(prompt);
                }
                if let Some(index) = index.as_deref_mut() {
                    if let Err(e) = index.sync(&[], repo_root).await {
                        warn!("Index sync failed: {}", e);
                        io.tool_warning(&format!("Index sync failed: {}", e));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_args() {
        let cli = Cli::try_parse_from(["seek", "query", "retry policy", "-k", "3", "--json"]).unwrap();
        match cli.command {
            Commands::Query(args) => {
                assert_eq!(args.text, "retry policy");
                assert_eq!(args.top_k, Some(3));
                assert!(args.json);
                assert!(!args.refresh);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sync_with_global_flags() {
        let cli = Cli::try_parse_from(["seek", "sync", "a.py", "src/b.rs", "--verbose", "--root", "/repo"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.root, Some(PathBuf::from("/repo")));
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.files, vec![PathBuf::from("a.py"), PathBuf::from("src/b.rs")])
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_review_pr_without_id() {
        let cli = Cli::try_parse_from(["seek", "review-pr"]).unwrap();
        match cli.command {
            Commands::ReviewPr(args) => assert!(args.id.is_empty()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_watch_loop_stops_on_shutdown_raised_mid_batch() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        std::fs::write(&a, "x = 1  # bump this ai!\n").unwrap();
        std::fs::write(&b, "y = 2  # and this ai!\n").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        tx.send(vec![a]).await.unwrap();
        tx.send(vec![b]).await.unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let mut stop_tx = Some(stop_tx);
        let mut prompts = Vec::new();
        let mut tracker = AiCommentTracker::new(dir.path());

        watch_loop(
            &mut rx,
            &mut tracker,
            None,
            dir.path(),
            ConsoleIo::new(true),
            stop_rx,
            |prompt| {
                prompts.push(prompt);
                if let Some(stop) = stop_tx.take() {
                    let _ = stop.send(());
                }
            },
        )
        .await;

        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("bump this ai!"));
        drop(tx);
    }

    #[tokio::test]
    async fn test_watch_loop_ends_when_channel_closes() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(1);
        drop(tx);

        let mut tracker = AiCommentTracker::new(dir.path());
        let mut prompts = Vec::new();
        watch_loop(
            &mut rx,
            &mut tracker,
            None,
            dir.path(),
            ConsoleIo::new(true),
            std::future::pending::<()>(),
            |prompt| prompts.push(prompt),
        )
        .await;
        assert!(prompts.is_empty());
    }

    #[test]
    fn test_parse_watch() {
        let cli = Cli::try_parse_from(["seek", "watch", "--sync"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch(WatchArgs { sync: true })));
    }
}
