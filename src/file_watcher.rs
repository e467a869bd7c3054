//! Watches the incoming photo folder and emits one event per new file.
//!
//! Files are reported when they are created in (or moved into) the folder or
//! one level of subfolders below it. Files already present when watching
//! starts are reported too when `include_existing` is set.

use crate::config::UploaderConfig;
use crate::error::Result;
use crate::logging::{log_debug, log_error, log_info, log_warn};
use crate::upload_queue::WatchedFile;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use walkdir::WalkDir;

const COMPONENT: &str = "watcher";

pub const DEFAULT_WRITE_SETTLE: Duration = Duration::from_millis(250);

/// A file still growing after this long is reported anyway
const MAX_SETTLE_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Absolute, canonical folder to watch
    pub root: PathBuf,
    pub include_existing: bool,
    /// Levels of subfolders below the root that are still watched
    pub max_depth: usize,
    /// Exact file names that are never reported
    pub ignored_names: Vec<String>,
    /// A live file is reported once its size holds still for this long; zero reports at once
    pub write_settle: Duration,
}

impl WatchOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_existing: true,
            max_depth: 1,
            ignored_names: vec![".DS_Store".to_string()],
            write_settle: DEFAULT_WRITE_SETTLE,
        }
    }

    pub fn from_config(config: &UploaderConfig, root: PathBuf) -> Self {
        Self {
            root,
            include_existing: config.include_existing,
            max_depth: config.max_depth,
            ignored_names: config.ignored_names.clone(),
            write_settle: config.write_settle(),
        }
    }

    pub fn include_existing(mut self, include: bool) -> Self {
        self.include_existing = include;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_write_settle(mut self, settle: Duration) -> Self {
        self.write_settle = settle;
        self
    }

    /// Number of path components below the root, `None` if outside it
    fn depth_of(&self, path: &Path) -> Option<usize> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|relative| relative.components().count())
    }

    fn is_ignored(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.ignored_names.iter().any(|ignored| ignored == name))
            .unwrap_or(false)
    }

    /// Whether a file at `path` should be reported
    pub fn accepts_file(&self, path: &Path) -> bool {
        match self.depth_of(path) {
            Some(depth) => depth >= 1 && depth <= self.max_depth + 1 && !self.is_ignored(path),
            None => false,
        }
    }

    /// Whether a directory at `path` can contain reportable files
    fn accepts_dir(&self, path: &Path) -> bool {
        matches!(self.depth_of(path), Some(depth) if depth >= 1 && depth <= self.max_depth)
    }
}

/// List reportable files currently under the root, sorted by path.
pub fn scan_directory(options: &WatchOptions) -> Vec<PathBuf> {
    scan_subtree(options, &options.root)
}

fn scan_subtree(options: &WatchOptions, start: &Path) -> Vec<PathBuf> {
    let Some(start_depth) = options.depth_of(start) else {
        return Vec::new();
    };
    let remaining = (options.max_depth + 1).saturating_sub(start_depth);
    if remaining == 0 {
        return Vec::new();
    }

    WalkDir::new(start)
        .min_depth(1)
        .max_depth(remaining)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log_error(COMPONENT, &format!("Failed to read directory entry: {}", e));
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| options.accepts_file(path))
        .collect()
}

/// Live watch on the incoming folder.
///
/// The event stream ends once the watcher is stopped or dropped.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("root", &self.root)
            .finish()
    }
}

impl DirectoryWatcher {
    pub fn start(
        options: WatchOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchedFile>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = options.root.clone();

        let handler_tx = tx.clone();
        let handler_options = options.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => handle_event(&handler_options, &event, &handler_tx),
                Err(e) => log_error(COMPONENT, &format!("Watch error: {}", e)),
            },
        )?;

        // Arm the watch before the initial scan so nothing created in between is missed
        watcher.watch(&root, RecursiveMode::Recursive)?;
        log_info(COMPONENT, &format!("Watching {}", root.display()));

        if options.include_existing {
            let existing = scan_directory(&options);
            if !existing.is_empty() {
                log_info(
                    COMPONENT,
                    &format!("Found {} photo(s) already waiting", existing.len()),
                );
            }
            for path in existing {
                emit(&tx, path);
            }
        }

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching; the event receiver drains and then ends.
    pub fn stop(self) {
        log_info(COMPONENT, &format!("Stopped watching {}", self.root.display()));
    }
}

/// Paths an event reports as newly present, if any.
///
/// A rename inside the tree also arrives as `Name(Both)` after its
/// `Name(To)`; only the latter is taken so the destination is reported once.
fn added_paths(event: &Event) -> &[PathBuf] {
    match &event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Folder | CreateKind::Any | CreateKind::Other) => {
            event.paths.as_slice()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => event.paths.as_slice(),
        _ => &[],
    }
}

fn handle_event(options: &WatchOptions, event: &Event, tx: &mpsc::UnboundedSender<WatchedFile>) {
    for path in added_paths(event) {
        if path.is_file() {
            if options.accepts_file(path) && wait_until_written(path, options.write_settle) {
                emit(tx, path.clone());
            }
        } else if path.is_dir() && options.accepts_dir(path) {
            // A folder moved in with content produces no per-file create events
            for file in scan_subtree(options, path) {
                if wait_until_written(&file, options.write_settle) {
                    emit(tx, file);
                }
            }
        }
    }
}

/// Block until the file size stops changing for `settle`.
///
/// Returns false if the file disappears meanwhile. Runs on the watcher's
/// event thread, so later events wait behind it and discovery order holds.
fn wait_until_written(path: &Path, settle: Duration) -> bool {
    let file_len = |p: &Path| std::fs::metadata(p).ok().filter(|m| m.is_file()).map(|m| m.len());

    let Some(mut last) = file_len(path) else {
        return false;
    };
    if settle.is_zero() {
        return true;
    }

    let deadline = Instant::now() + MAX_SETTLE_WAIT;
    loop {
        std::thread::sleep(settle);
        let Some(len) = file_len(path) else {
            log_debug(COMPONENT, &format!("{} vanished before it settled", path.display()));
            return false;
        };
        if len == last {
            return true;
        }
        if Instant::now() >= deadline {
            log_warn(
                COMPONENT,
                &format!("{} is still growing, reporting it anyway", path.display()),
            );
            return true;
        }
        last = len;
    }
}

fn emit(tx: &mpsc::UnboundedSender<WatchedFile>, path: PathBuf) {
    log_debug(COMPONENT, &format!("Discovered {}", path.display()));
    if tx.send(WatchedFile::new(path)).is_err() {
        log_debug(COMPONENT, "Event receiver dropped, discarding discovery");
    }
}
