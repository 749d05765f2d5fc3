//! Watch mode: rebuild whenever a source file changes.
//!
//! Watches the entry module's directory recursively. After every successful
//! build the directories of inputs living elsewhere (a module imported from
//! `../shared`, a Sass partial in `../styles`) are watched too. Bursts of
//! events (editors often write a file several times) are coalesced into one
//! rebuild. Watch builds are never production builds; a failed rebuild is
//! reported and the watcher keeps running.

use super::{codes, BuildError, BuildOptions, BuildReport, Pipeline};
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Quiet period after the last relevant event before rebuilding.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// How often the stop flag is checked while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Extensions whose changes trigger a rebuild.
const WATCHED_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "scss", "sass", "css",
];

/// Watcher error.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl WatchError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        codes::BUILD_WATCH_ERROR
    }
}

/// Directory watched for `pipeline`: the directory holding the entry module.
#[must_use]
pub fn watch_root(pipeline: &Pipeline) -> PathBuf {
    let entry = pipeline.config().entry_path();
    entry
        .parent()
        .map_or_else(|| pipeline.config().root.clone(), Path::to_path_buf)
}

/// Directories holding `inputs` that a recursive watch on `root` misses.
///
/// Sorted and without duplicates.
#[must_use]
pub fn outside_dirs(inputs: &[PathBuf], root: &Path) -> Vec<PathBuf> {
    inputs
        .iter()
        .filter(|input| !input.starts_with(root))
        .filter_map(|input| input.parent())
        .map(Path::to_path_buf)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Whether `event` can change build inputs.
#[must_use]
pub fn should_process_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
            | EventKind::Remove(RemoveKind::File | RemoveKind::Any)
    )
}

/// Whether a change to `path` should trigger a rebuild.
///
/// Hidden files (editor swap files, `.DS_Store`) and anything under `ignored`
/// (the output directory) are skipped.
#[must_use]
pub fn is_watched_path(path: &Path, ignored: &Path) -> bool {
    if path.starts_with(ignored) {
        return false;
    }

    let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    if hidden {
        return false;
    }

    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| WATCHED_EXTENSIONS.contains(&ext))
}

/// Build once, then rebuild on every relevant change until `stop` is set.
///
/// `on_build` sees the result of every build, including the first. `options`
/// is used with `production` forced off.
pub fn watch<F>(
    pipeline: &Pipeline,
    options: BuildOptions,
    stop: &AtomicBool,
    mut on_build: F,
) -> Result<(), WatchError>
where
    F: FnMut(&Result<BuildReport, BuildError>),
{
    let options = options.with_production(false);
    let root = watch_root(pipeline);
    // Inputs are canonical paths.
    let canonical_root = dunce::canonicalize(&root).unwrap_or_else(|_| root.clone());
    let ignored = pipeline.config().dist_root();

    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(tx, Config::default()).map_err(|source| {
        WatchError::Watch {
            path: root.clone(),
            source,
        }
    })?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|source| WatchError::Watch {
            path: root.clone(),
            source,
        })?;
    info!(root = %root.display(), "watching for changes");

    let mut extra = BTreeSet::new();
    let result = rebuild(pipeline, options);
    watch_outside(&mut watcher, &canonical_root, &mut extra, &result);
    on_build(&result);

    let mut pending = false;
    let mut last_event = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                if should_process_event(&event)
                    && event.paths.iter().any(|p| is_watched_path(p, &ignored))
                {
                    debug!(paths = ?event.paths, "change detected");
                    pending = true;
                    last_event = Instant::now();
                }
            }
            Ok(Err(e)) => warn!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if pending && last_event.elapsed() >= DEBOUNCE {
            pending = false;
            let result = rebuild(pipeline, options);
            watch_outside(&mut watcher, &canonical_root, &mut extra, &result);
            on_build(&result);
        }
    }

    debug!("watcher stopped");
    Ok(())
}

/// Add a non-recursive watch for each new directory outside `root` that holds
/// an input of a successful build. Watches are never removed.
fn watch_outside<W: Watcher>(
    watcher: &mut W,
    root: &Path,
    watched: &mut BTreeSet<PathBuf>,
    result: &Result<BuildReport, BuildError>,
) {
    let Ok(report) = result else {
        return;
    };
    for dir in outside_dirs(&report.inputs, root) {
        if watched.contains(&dir) {
            continue;
        }
        match watcher.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                debug!(dir = %dir.display(), "watching input directory");
                watched.insert(dir);
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to watch input directory"),
        }
    }
}

fn rebuild(pipeline: &Pipeline, options: BuildOptions) -> Result<BuildReport, BuildError> {
    let result = pipeline.run(options);
    if let Err(err) = &result {
        warn!(
            code = err.code(),
            location = err.location().unwrap_or(""),
            error = %err,
            "rebuild failed, still watching"
        );
    }
    result
}
