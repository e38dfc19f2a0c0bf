//! One-time, process-wide library initialization.

use once_cell::sync::OnceCell;

use crate::error::Result;

/// Runs an initialization closure at most once and replays its outcome.
///
/// A [`NativeLibrary`](crate::NativeLibrary) keeps one of these (usually in
/// a `static`) and calls [`Bootstrap::run`] from `init`, so connections can
/// ask for initialization as often as they like.
#[derive(Debug)]
pub struct Bootstrap {
    outcome: OnceCell<Result<()>>,
}

impl Bootstrap {
    /// Create an empty bootstrap cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outcome: OnceCell::new(),
        }
    }

    /// Run `init` if it has never run, then return its (cached) outcome.
    pub fn run<F>(&self, init: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.outcome
            .get_or_init(|| {
                let outcome = init();
                match &outcome {
                    Ok(()) => tracing::debug!("native library initialized"),
                    Err(e) => tracing::error!(error = %e, "native library initialization failed"),
                }
                outcome
            })
            .clone()
    }

    /// Whether initialization has been attempted.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.outcome.get().is_some()
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}
