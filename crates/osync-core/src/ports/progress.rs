//! Progress sink port
//!
//! A session narrates everything it does (phases, counts, per-item
//! failures, the final status) as plain text lines. The session task is
//! the only caller: fetch workers report back to it instead of writing to
//! the sink themselves, so implementations need not tolerate concurrent
//! calls beyond what `Sync` already demands.

/// Receiver of human-readable progress lines.
pub trait ProgressSink: Send + Sync {
    /// Record one line of progress.
    fn log(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn log(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_closure_is_a_sink() {
        let lines = Mutex::new(Vec::new());
        let sink = |m: &str| lines.lock().unwrap().push(m.to_string());
        sink.log("one");
        ProgressSink::log(&sink, "two");
        assert_eq!(*lines.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_null_sink_accepts_anything() {
        let sink: &dyn ProgressSink = &NullSink;
        sink.log("ignored");
    }
}
