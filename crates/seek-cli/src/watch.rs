//! Watch the repository for "AI" comments and turn them into prompts.
//!
//! An AI comment is a line comment (`#`, `//`, `--`, `;`) that starts with
//! the word `ai` or ends with `ai`, optionally followed by a marker:
//! `!` asks for code changes, `?` asks a question, `@` asks for an
//! architecture plan.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use once_cell::sync::Lazy;
use regex::Regex;
use seek_index::RepoFilter;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::prompts::{WATCH_ARCHITECT_PROMPT, WATCH_ASK_PROMPT, WATCH_CODE_PROMPT};

static AI_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:#|//|--|;+) *(ai\b.*|.*\bai[?!@]?) *$").expect("valid AI comment regex")
});

/// Errors that can occur while watching.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create watcher: {0}")]
    Create(String),

    #[error("Failed to watch path: {0}")]
    Watch(String),
}

/// What an AI comment asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AiAction {
    /// `ai?`
    Ask,
    /// `ai@`
    Architect,
    /// `ai!`
    Code,
}

impl AiAction {
    fn from_comment(comment: &str) -> Option<Self> {
        let text = comment
            .to_lowercase()
            .trim_start_matches(['/', '#', '-', ';'])
            .trim()
            .to_string();

        [("ai!", Self::Code), ("ai@", Self::Architect), ("ai?", Self::Ask)]
            .into_iter()
            .find(|(marker, _)| text.starts_with(marker) || text.ends_with(marker))
            .map(|(_, action)| action)
    }

    pub fn marker(self) -> char {
        match self {
            Self::Code => '!',
            Self::Ask => '?',
            Self::Architect => '@',
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Code => WATCH_CODE_PROMPT,
            Self::Ask => WATCH_ASK_PROMPT,
            Self::Architect => WATCH_ARCHITECT_PROMPT,
        }
    }
}

/// AI comments found in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiComments {
    /// 1-indexed line numbers
    pub line_numbers: Vec<usize>,
    pub comments: Vec<String>,
    /// Strongest action in the file (`!` over `@` over `?`)
    pub action: Option<AiAction>,
}

impl AiComments {
    pub fn is_empty(&self) -> bool {
        self.line_numbers.is_empty()
    }
}

/// Scan `content` for AI comments.
pub fn find_ai_comments(content: &str) -> AiComments {
    let mut found = AiComments::default();
    for (idx, line) in content.lines().enumerate() {
        let Some(m) = AI_COMMENT.find(line) else {
            continue;
        };
        let comment = m.as_str().trim();
        if comment.is_empty() {
            continue;
        }
        found.line_numbers.push(idx + 1);
        found.comments.push(comment.to_string());
        found.action = found.action.max(AiAction::from_comment(comment));
    }
    found
}

/// Collects changed files and renders prompts for their AI comments.
pub struct AiCommentTracker {
    root: PathBuf,
    changed_files: BTreeSet<PathBuf>,
}

impl AiCommentTracker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            changed_files: BTreeSet::new(),
        }
    }

    pub fn add_changed(&mut self, path: impl Into<PathBuf>) {
        self.changed_files.insert(path.into());
    }

    pub fn changed_files(&self) -> &BTreeSet<PathBuf> {
        &self.changed_files
    }

    /// AI comments in `path`; unreadable files have none.
    pub fn get_ai_comments(&self, path: &Path) -> AiComments {
        match std::fs::read_to_string(path) {
            Ok(content) => find_ai_comments(&content),
            Err(e) => {
                debug!("Cannot scan {:?}: {}", path, e);
                AiComments::default()
            }
        }
    }

    /// Build a prompt from the changed files, or `None` when no comment
    /// carries an action. The changed set is cleared either way.
    pub fn process_changes(&mut self) -> Option<String> {
        let changed = std::mem::take(&mut self.changed_files);

        let mut action = None;
        let mut sections = Vec::new();
        for path in &changed {
            let found = self.get_ai_comments(path);
            if found.is_empty() {
                continue;
            }
            action = action.max(found.action);
            sections.push(self.render_file(path, &found));
        }

        let action = action?;
        let mut prompt = String::from(action.prompt());
        for section in sections {
            prompt.push('\n');
            prompt.push_str(&section);
        }
        Some(prompt)
    }

    fn render_file(&self, path: &Path, found: &AiComments) -> String {
        let display = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        let lines: Vec<String> = std::fs::read_to_string(path)
            .map(|c| c.lines().map(str::to_string).collect())
            .unwrap_or_default();

        let mut out = format!("{}:\n", display);
        for (n, comment) in found.line_numbers.iter().zip(&found.comments) {
            let line = lines.get(n - 1).map(String::as_str).unwrap_or(comment);
            out.push_str(&format!("█{:>5} {}\n", n, line.trim_end()));
        }
        out
    }
}

/// Recursive file watcher emitting debounced batches of changed files.
pub struct FileWatcher {
    root: PathBuf,
    debounce: Duration,
    filter: RepoFilter,
    // Dropping the watcher stops notifications
    watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(root: PathBuf, debounce: Duration, filter: RepoFilter) -> Self {
        Self {
            root,
            debounce,
            filter,
            watcher: None,
        }
    }

    /// Start watching. Each message on the returned channel is a batch of
    /// files that changed and then stayed quiet for the debounce period.
    pub fn start(&mut self) -> Result<mpsc::Receiver<Vec<PathBuf>>, WatchError> {
        let (raw_tx, mut raw_rx) = mpsc::channel::<PathBuf>(256);
        let (batch_tx, batch_rx) = mpsc::channel(16);
        let filter = self.filter.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for path in event.paths {
                if filter.accepts_file(&path) {
                    let _ = raw_tx.blocking_send(path);
                }
            }
        })
        .map_err(|e| WatchError::Create(e.to_string()))?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch(e.to_string()))?;
        self.watcher = Some(watcher);

        let debounce = self.debounce;
        tokio::spawn(async move {
            debounce_paths(&mut raw_rx, batch_tx, debounce).await;
        });

        info!("Started watching {:?} with {:?} debounce", self.root, debounce);
        Ok(batch_rx)
    }

    pub fn stop(&mut self) {
        self.watcher = None;
        info!("Stopped watching {:?}", self.root);
    }
}

/// Batch paths until none has been seen for `debounce`.
async fn debounce_paths(
    raw_rx: &mut mpsc::Receiver<PathBuf>,
    batch_tx: mpsc::Sender<Vec<PathBuf>>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
    let tick = Duration::from_millis(50);

    loop {
        match tokio::time::timeout(tick, raw_rx.recv()).await {
            Ok(Some(path)) => {
                pending.insert(path, Instant::now());
                continue;
            }
            Ok(None) => {
                if !pending.is_empty() {
                    let _ = batch_tx.send(drain_sorted(&mut pending)).await;
                }
                return;
            }
            Err(_) => {}
        }

        let now = Instant::now();
        let quiet = pending
            .values()
            .all(|seen| now.duration_since(*seen) >= debounce);
        if !pending.is_empty() && quiet && batch_tx.send(drain_sorted(&mut pending)).await.is_err() {
            return;
        }
    }
}

fn drain_sorted(pending: &mut HashMap<PathBuf, Instant>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = pending.drain().map(|(path, _)| path).collect();
    paths.sort();
    paths
}
