use fnv::FnvHashMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use tracing::debug;

/// Last observed reference metric (open interest or volume) per instrument, used to derive the
/// percentage change between consecutive refresh cycles.
///
/// Owned by a [`Scanner`](crate::orchestrator::Scanner) for the lifetime of the process. Entries
/// are never evicted.
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    last: Mutex<FnvHashMap<SmolStr, f64>>,
}

impl ReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` for `symbol` and return the percentage change from the previous value.
    ///
    /// Returns 0.0 for a symbol observed for the first time, or when the previous value was
    /// zero. The lookup and overwrite happen under one lock acquisition, so concurrent
    /// observations of the same symbol never interleave.
    pub fn observe(&self, symbol: &str, current: f64) -> f64 {
        let previous = self.last.lock().insert(SmolStr::new(symbol), current);

        match previous {
            None => 0.0,
            Some(previous) if previous > 0.0 => (current - previous) / previous * 100.0,
            Some(previous) => {
                debug!(
                    %symbol,
                    previous,
                    current,
                    "reference metric baseline is zero, reporting 0% change"
                );
                0.0
            }
        }
    }

    /// Last value stored for `symbol`.
    pub fn previous(&self, symbol: &str) -> Option<f64> {
        self.last.lock().get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.last.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.lock().is_empty()
    }
}
