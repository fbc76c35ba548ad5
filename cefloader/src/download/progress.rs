//! Coarse progress reporting.
//!
//! Long-running phases (sequential download, bzip2 decompression) report a
//! percentage for every block they process. [`ProgressThrottle`] turns that
//! stream into at most one notification per 10-point boundary, and
//! [`ProgressReporter`] logs the survivors and forwards them to an optional
//! callback.

use tracing::info;

/// Granularity of emitted progress notifications, in percentage points.
pub const PROGRESS_STEP: u32 = 10;

/// Callback receiving throttled percentages.
pub type PercentCallback<'a> = &'a (dyn Fn(u32) + Send + Sync);

/// Compute a whole percentage, clamped to 100. Unknown totals report 0.
pub fn percent_of(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (done.saturating_mul(100) / total).min(100) as u32
}

/// Suppresses repeated and intermediate progress percentages.
///
/// The watermark resets whenever progress drops below the first step, which
/// happens when a new phase (or a fallback download attempt) starts from zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressThrottle {
    last_percent: u32,
}

impl ProgressThrottle {
    /// Create a throttle with a zero watermark.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a percentage; returns it only if it should be reported.
    pub fn observe(&mut self, percent: u32) -> Option<u32> {
        if percent < PROGRESS_STEP {
            self.last_percent = 0;
        }
        if percent % PROGRESS_STEP != 0 || percent == self.last_percent {
            return None;
        }
        self.last_percent = percent;
        Some(percent)
    }

    /// Clear the watermark before a new phase starts.
    pub fn reset(&mut self) {
        self.last_percent = 0;
    }

    /// The last percentage that was reported.
    pub fn last_percent(&self) -> u32 {
        self.last_percent
    }
}

/// Logs throttled progress for one phase.
pub struct ProgressReporter<'a> {
    phase: &'static str,
    throttle: &'a mut ProgressThrottle,
    callback: Option<PercentCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    /// Create a reporter for `phase` (e.g. "Download") sharing `throttle`.
    pub fn new(phase: &'static str, throttle: &'a mut ProgressThrottle) -> Self {
        Self {
            phase,
            throttle,
            callback: None,
        }
    }

    /// Forward every emitted percentage to `callback` as well.
    pub fn with_callback(mut self, callback: Option<PercentCallback<'a>>) -> Self {
        self.callback = callback;
        self
    }

    /// Report `done` out of `total` units. Returns the emitted percentage, if any.
    pub fn report(&mut self, done: u64, total: u64) -> Option<u32> {
        if total == 0 {
            return None;
        }
        let emitted = self.throttle.observe(percent_of(done, total))?;
        info!("{} progress = {}%", self.phase, emitted);
        if let Some(cb) = self.callback {
            cb(emitted);
        }
        Some(emitted)
    }
}

impl std::fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("phase", &self.phase)
            .field("throttle", &self.throttle)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
