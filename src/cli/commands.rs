use std::{
    path::{Path, PathBuf},
    pin::pin,
    sync::Arc,
};

use futures::StreamExt;
use tracing::{info, instrument};

use super::formatting::{format_notification, format_op};
use crate::{
    core::{PropsError, Result},
    dispatch::Dispatcher,
    refresh::{RefreshScheduler, refresh_from},
    settings::{Settings, SourceSettings},
    snapshot_store::{Op, OpKind, RefreshEngine, diff_maps},
    sources::{FileSource, LayeredSource, Source, SourceFormat},
};

/// Layers the configured `[[sources]]` and then `files`, and returns the
/// paths that should trigger a refresh when they change.
fn open_layers(
    files: &[PathBuf],
    format: SourceFormat,
    settings: &Settings,
) -> Result<(LayeredSource<String>, Vec<PathBuf>)> {
    let entries = settings
        .sources
        .iter()
        .cloned()
        .chain(files.iter().map(|file| SourceSettings::new(file, format)));

    let mut layers = LayeredSource::new();
    let mut watched = Vec::new();
    for entry in entries {
        if entry.watch {
            watched.push(entry.path.clone());
        }
        layers.push(Box::new(entry.open()));
    }

    if layers.is_empty() {
        return Err(PropsError::NoSources);
    }
    Ok((layers, watched))
}

/// Serves the layered sources through a refresh scheduler and prints every
/// change that matches `pattern` until Ctrl+C.
///
/// # Errors
/// Returns `PropsError::NoSources` if no file is configured or given, or an
/// error if the scheduler cannot start or does not shut down within the
/// configured grace period.
#[instrument(skip(files, settings), fields(files = files.len()))]
pub async fn watch(
    files: &[PathBuf],
    pattern: &str,
    format: SourceFormat,
    settings: &Settings,
) -> Result<()> {
    let (source, watched) = open_layers(files, format, settings)?;
    let name = source.name().to_string();
    let engine = RefreshEngine::with_policy(settings.quiescence.policy());
    let dispatcher = Dispatcher::new();
    let subscription = dispatcher.subscribe(pattern).await?;

    let handle = watched
        .into_iter()
        .fold(
            RefreshScheduler::new(engine, Arc::new(source), dispatcher)
                .with_settings(settings.refresh.clone()),
            |scheduler, path| scheduler.watch_file(path),
        )
        .spawn()?;

    println!("Watching '{name}' for '{pattern}'...");
    println!("Press Ctrl+C to stop");

    let mut notifications = pin!(subscription.into_stream());
    let mut interrupted = pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            notification = notifications.next() => match notification {
                Some(notification) => println!("{}", format_notification(&notification)),
                None => break,
            },
            _ = &mut interrupted => break,
        }
    }

    info!("stopping watch");
    let grace = handle.shutdown_grace();
    handle.shutdown(grace).await?;

    Ok(())
}

/// Returns the changes that turn `old` into `new`, one per line.
///
/// Lines keep the change-set grouping (deletions, then modifications, then
/// new keys) and are sorted by key within each group.
///
/// # Errors
/// Returns an error if either file cannot be read.
pub fn diff(old: &Path, new: &Path, format: SourceFormat) -> Result<String> {
    let current = FileSource::open(old, format).read()?;
    let replacement = FileSource::open(new, format).read()?;

    let mut ops = diff_maps(&current, &replacement);
    let group = |op: &Op<String>| match op.kind {
        OpKind::Delete => 0,
        _ if current.contains_key(&op.key) => 1,
        _ => 2,
    };
    ops.sort_by(|a, b| group(a).cmp(&group(b)).then_with(|| a.key.cmp(&b.key)));

    Ok(ops.iter().map(format_op).collect::<Vec<_>>().join("\n"))
}

/// Loads the layered sources into a store and returns the value of `key`.
///
/// # Errors
/// Returns `PropsError::KeyNotFound` if the key is absent,
/// `PropsError::NoSources` if no file is configured or given, or the read
/// error if a layer cannot be loaded.
pub fn get(
    key: &str,
    files: &[PathBuf],
    format: SourceFormat,
    settings: &Settings,
) -> Result<String> {
    let (source, _) = open_layers(files, format, settings)?;
    let mut engine = RefreshEngine::with_policy(settings.quiescence.policy());
    let view = engine.reader()?;

    refresh_from(&mut engine, &source)?;

    view.get(key).ok_or_else(|| PropsError::KeyNotFound {
        key: key.to_string(),
        source_name: source.name().to_string(),
    })
}
