use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;

/// A file system event for a watched file.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The path of the file that changed
    pub path: PathBuf,
    /// The type of change that occurred
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum FileEventKind {
    /// File was modified
    Modified,
    /// File was created
    Created,
    /// File was removed
    Removed,
}

type Targets = Arc<RwLock<HashSet<PathBuf>>>;

/// Watches individual files and forwards their events to a Tokio channel.
///
/// Each file is watched through its parent directory so that editors which
/// replace the file by renaming a temporary one are still noticed.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    targets: Targets,
    directories: HashMap<PathBuf, usize>,
}

impl FileWatcher {
    /// Creates a new file watcher and returns the watcher and event receiver.
    ///
    /// Uses an unbounded channel since file events are typically infrequent but bursty.
    ///
    /// # Errors
    /// Returns error if the underlying file system watcher cannot be initialized.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let targets: Targets = Arc::default();
        let filter = Arc::clone(&targets);

        let watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            let kind = match event.kind {
                EventKind::Create(_) => FileEventKind::Created,
                EventKind::Modify(_) => FileEventKind::Modified,
                EventKind::Remove(_) => FileEventKind::Removed,
                _ => return,
            };

            let watched = match filter.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for path in event.paths {
                if watched.contains(&path) {
                    let _ = event_tx.send(FileEvent {
                        path,
                        kind: kind.clone(),
                    });
                }
            }
        })?;

        Ok((
            Self {
                watcher,
                targets,
                directories: HashMap::new(),
            },
            event_rx,
        ))
    }

    /// Adds a file to the watch list. The file itself does not need to
    /// exist yet, but its directory does.
    ///
    /// If the file is already being watched, this operation is a no-op.
    ///
    /// # Errors
    /// Returns error if the directory cannot be canonicalized or the watcher
    /// fails to monitor it.
    pub fn watch_file(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        let (directory, target) = locate(path.as_ref())?;

        if !self.write_targets().insert(target.clone()) {
            return Ok(());
        }

        let watchers = self.directories.get(&directory).copied().unwrap_or(0);
        if watchers == 0
            && let Err(e) = self.watcher.watch(&directory, RecursiveMode::NonRecursive)
        {
            self.write_targets().remove(&target);
            return Err(e);
        }
        self.directories.insert(directory, watchers + 1);

        Ok(())
    }

    /// Removes a file from the watch list.
    ///
    /// If the file is not currently being watched, this operation is a no-op.
    ///
    /// # Errors
    /// Returns error if the directory cannot be canonicalized or the watcher
    /// fails to stop monitoring it.
    pub fn unwatch_file(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        let (directory, target) = locate(path.as_ref())?;

        if !self.write_targets().remove(&target) {
            return Ok(());
        }

        if let Some(watchers) = self.directories.get_mut(&directory) {
            *watchers -= 1;
            if *watchers == 0 {
                self.directories.remove(&directory);
                self.watcher.unwatch(&directory)?;
            }
        }

        Ok(())
    }

    /// Files currently watched, canonicalized.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        let targets = match self.targets.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        targets.iter().cloned().collect()
    }

    fn write_targets(&self) -> std::sync::RwLockWriteGuard<'_, HashSet<PathBuf>> {
        match self.targets.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn locate(path: &Path) -> Result<(PathBuf, PathBuf), notify::Error> {
    let file_name = path.file_name().ok_or_else(|| {
        notify::Error::generic("watched path has no file name").add_path(path.to_path_buf())
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let directory = parent.canonicalize()?;
    let target = directory.join(file_name);

    Ok((directory, target))
}
