use tracing::{debug, info};

use super::RefreshError;
use crate::{
    snapshot_store::{ChangeSet, RefreshEngine},
    sources::Source,
};

/// Runs one refresh cycle of `engine` against `source`.
///
/// The source is read before anything is staged, so a failed read leaves
/// both sides of the store untouched. If a previous flush stopped on a
/// stalled reader, this cycle only resumes that flush and the source is
/// read again on the next one.
///
/// # Errors
/// Returns `RefreshError::Source` if the source cannot be read and
/// `RefreshError::Store` if the flush reports a stalled reader.
pub fn refresh_from<S>(
    engine: &mut RefreshEngine<S::Value>,
    source: &S,
) -> Result<ChangeSet<S::Value>, RefreshError>
where
    S: Source + ?Sized,
    S::Value: Clone + PartialEq + Send + Sync,
{
    if engine.is_pending() {
        info!(source = source.name(), "resuming pending flush");
        return Ok(engine.flush()?);
    }

    let fresh = source.read()?;
    debug!(source = source.name(), keys = fresh.len(), "staging values");

    engine.staging_mut()?.replace_all(fresh);
    Ok(engine.flush()?)
}
