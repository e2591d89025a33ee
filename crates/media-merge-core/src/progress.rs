use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receiver for progress updates from long-running work
///
/// Every method has a do-nothing default, so a sink only overrides what it can
/// display or answer. All calls are made synchronously on the worker's thread.
pub trait ProgressSink: Send {
    fn set_title(&self, _title: &str) {}

    fn title(&self) -> String {
        String::new()
    }

    fn set_maximum(&self, _maximum: u64) {}

    fn maximum(&self) -> u64 {
        0
    }

    fn set_value(&self, _value: u64) {}

    fn value(&self) -> u64 {
        0
    }

    fn inc_progress(&self) {}

    fn reset_progress(&self) {}

    fn was_canceled(&self) -> bool {
        false
    }
}

/// Sink that ignores every update and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {}

/// Shared cancellation flag
///
/// Clones observe the same flag, so one can be handed to a signal handler or
/// watchdog while another is polled by the sink.
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Wraps a sink so cancellation also answers to a [`CancelToken`]
pub struct Cancellable<S> {
    inner: S,
    token: CancelToken,
}

impl<S: ProgressSink> Cancellable<S> {
    pub fn new(inner: S, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<S: ProgressSink> ProgressSink for Cancellable<S> {
    fn set_title(&self, title: &str) {
        self.inner.set_title(title);
    }

    fn title(&self) -> String {
        self.inner.title()
    }

    fn set_maximum(&self, maximum: u64) {
        self.inner.set_maximum(maximum);
    }

    fn maximum(&self) -> u64 {
        self.inner.maximum()
    }

    fn set_value(&self, value: u64) {
        self.inner.set_value(value);
    }

    fn value(&self) -> u64 {
        self.inner.value()
    }

    fn inc_progress(&self) {
        self.inner.inc_progress();
    }

    fn reset_progress(&self) {
        self.inner.reset_progress();
    }

    fn was_canceled(&self) -> bool {
        self.token.is_canceled() || self.inner.was_canceled()
    }
}

/// Saved (title, value, maximum) of an enclosing phase
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProgressState {
    title: String,
    value: u64,
    maximum: u64,
}

/// Cancellable, nestable progress reporting with no UI dependency
///
/// `push_state`/`pop_state` let a sub-phase show its own title and range and
/// hand the display back to the enclosing phase afterwards.
pub struct Progress {
    sink: Box<dyn ProgressSink>,
    stack: Vec<ProgressState>,
}

impl Progress {
    pub fn new(sink: impl ProgressSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            stack: Vec::new(),
        }
    }

    /// Reporter for batch runs and tests: nothing is shown, nothing cancels
    pub fn headless() -> Self {
        Self::new(NoopSink)
    }

    pub fn set_title(&self, title: &str) {
        self.sink.set_title(title);
    }

    pub fn title(&self) -> String {
        self.sink.title()
    }

    pub fn set_maximum(&self, maximum: u64) {
        self.sink.set_maximum(maximum);
    }

    pub fn maximum(&self) -> u64 {
        self.sink.maximum()
    }

    pub fn set_value(&self, value: u64) {
        self.sink.set_value(value);
    }

    pub fn value(&self) -> u64 {
        self.sink.value()
    }

    pub fn inc_progress(&self) {
        self.sink.inc_progress();
    }

    pub fn reset_progress(&self) {
        self.sink.reset_progress();
    }

    pub fn was_canceled(&self) -> bool {
        self.sink.was_canceled()
    }

    pub fn push_state(&mut self) {
        self.stack.push(ProgressState {
            title: self.title(),
            value: self.value(),
            maximum: self.maximum(),
        });
    }

    /// Restore the most recently pushed state; no-op when nothing was pushed
    pub fn pop_state(&mut self) {
        let Some(state) = self.stack.pop() else {
            return;
        };
        self.set_title(&state.title);
        self.set_value(state.value);
        self.set_maximum(state.maximum);
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::headless()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Shared {
        title: Mutex<String>,
        value: AtomicU64,
        maximum: AtomicU64,
        resets: AtomicU64,
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        shared: Arc<Shared>,
    }

    impl ProgressSink for RecordingSink {
        fn set_title(&self, title: &str) {
            *self.shared.title.lock().unwrap() = title.to_string();
        }

        fn title(&self) -> String {
            self.shared.title.lock().unwrap().clone()
        }

        fn set_maximum(&self, maximum: u64) {
            self.shared.maximum.store(maximum, Ordering::SeqCst);
        }

        fn maximum(&self) -> u64 {
            self.shared.maximum.load(Ordering::SeqCst)
        }

        fn set_value(&self, value: u64) {
            self.shared.value.store(value, Ordering::SeqCst);
        }

        fn value(&self) -> u64 {
            self.shared.value.load(Ordering::SeqCst)
        }

        fn inc_progress(&self) {
            self.shared.value.fetch_add(1, Ordering::SeqCst);
        }

        fn reset_progress(&self) {
            self.shared.value.store(0, Ordering::SeqCst);
            self.shared.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_headless_progress_returns_defaults() {
        let mut progress = Progress::headless();
        progress.set_title("Merging");
        progress.set_maximum(10);
        progress.inc_progress();
        progress.reset_progress();
        progress.push_state();
        progress.pop_state();

        assert_eq!(progress.title(), "");
        assert_eq!(progress.maximum(), 0);
        assert_eq!(progress.value(), 0);
        assert!(!progress.was_canceled());
    }

    #[test]
    fn test_pop_without_push_is_noop() {
        let sink = RecordingSink::default();
        let mut progress = Progress::new(sink.clone());
        progress.set_title("Outer");
        progress.pop_state();
        assert_eq!(progress.title(), "Outer");
        assert_eq!(progress.depth(), 0);
    }

    #[test]
    fn test_push_pop_restores_enclosing_phase() {
        let sink = RecordingSink::default();
        let mut progress = Progress::new(sink.clone());
        progress.set_title("Loading users");
        progress.set_maximum(4);
        progress.inc_progress();

        progress.push_state();
        progress.reset_progress();
        progress.set_title("Loading media");
        progress.set_maximum(100);
        for _ in 0..40 {
            progress.inc_progress();
        }
        assert_eq!(progress.value(), 40);

        progress.pop_state();
        assert_eq!(progress.title(), "Loading users");
        assert_eq!(progress.value(), 1);
        assert_eq!(progress.maximum(), 4);
        assert_eq!(sink.shared.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nested_states_unwind_in_order() {
        let sink = RecordingSink::default();
        let mut progress = Progress::new(sink);
        progress.set_title("one");
        progress.push_state();
        progress.set_title("two");
        progress.push_state();
        progress.set_title("three");

        progress.pop_state();
        assert_eq!(progress.title(), "two");
        progress.pop_state();
        assert_eq!(progress.title(), "one");
    }

    #[test]
    fn test_cancel_token_cancels_wrapped_sink() {
        let token = CancelToken::new();
        let progress = Progress::new(Cancellable::new(NoopSink, token.clone()));
        assert!(!progress.was_canceled());
        token.cancel();
        assert!(progress.was_canceled());
    }
}
