use std::{
    hint, thread,
    time::{Duration, Instant},
};

use tracing::{trace, warn};

use super::{StoreError, registry::ReaderRegistry};

/// Default number of busy retries before the writer starts yielding.
pub const DEFAULT_SPIN_LIMIT: u32 = 20;

/// How the writer waits for in-flight readers after an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuiescencePolicy {
    /// Retries spent spinning before each further retry yields the thread.
    pub spin_limit: u32,
    /// Upper bound on a single wait. `None` waits as long as it takes.
    pub max_wait: Option<Duration>,
}

impl Default for QuiescencePolicy {
    fn default() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            max_wait: None,
        }
    }
}

impl QuiescencePolicy {
    /// Unbounded policy with the default spin limit.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Policy that gives up with `StoreError::StalledReader` after `max_wait`.
    pub fn bounded(max_wait: Duration) -> Self {
        Self {
            max_wait: Some(max_wait),
            ..Self::default()
        }
    }
}

/// Progress of one grace period.
///
/// Kept across calls so a wait that timed out resumes where it stopped
/// instead of rescanning readers already seen idle.
#[derive(Debug, Default)]
pub(crate) struct GracePeriod {
    cursor: usize,
    observed: Option<u64>,
    retries: u32,
}

impl GracePeriod {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Scans forward from the cursor until every reader that was in flight
    /// at exchange time has finished.
    ///
    /// A counter is done once it is even, or once it differs from the odd
    /// value first observed for it: the straddling read has completed and any
    /// later read started after the exchange.
    ///
    /// # Errors
    /// Returns `StoreError::StalledReader` if `policy.max_wait` elapses first.
    pub(crate) fn wait(
        &mut self,
        readers: &ReaderRegistry,
        policy: &QuiescencePolicy,
    ) -> Result<(), StoreError> {
        let started = Instant::now();

        loop {
            if self.cursor >= readers.len() {
                trace!(
                    readers = self.cursor,
                    retries = self.retries,
                    "grace period complete"
                );
                return Ok(());
            }

            // An index without a slot is mid-registration; that reader may
            // enter at any moment, so wait for it to be published.
            if let Some(slot) = readers.slot(self.cursor) {
                let accesses = slot.load();
                let done =
                    accesses % 2 == 0 || self.observed.is_some_and(|seen| seen != accesses);

                if done {
                    self.cursor += 1;
                    self.observed = None;
                    continue;
                }

                self.observed.get_or_insert(accesses);
            }

            self.retries = self.retries.saturating_add(1);
            if self.retries > policy.spin_limit {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }

            if let Some(max_wait) = policy.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    warn!(
                        reader = self.cursor,
                        ?waited,
                        "reader still in flight, giving up on grace period"
                    );
                    return Err(StoreError::StalledReader {
                        index: self.cursor,
                        waited,
                    });
                }
            }
        }
    }
}
