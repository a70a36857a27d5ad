/// A finished session as handed to a [`SessionRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Oldest first.
    pub lines: Vec<String>,
    pub total_duration_secs: u64,
}

/// Receives each naturally completed session. Stopped sessions are never
/// recorded.
pub trait SessionRecorder {
    fn record(&mut self, lines_in_order: &[String], total_duration_secs: u64);
}

impl<T: SessionRecorder + ?Sized> SessionRecorder for Box<T> {
    fn record(&mut self, lines_in_order: &[String], total_duration_secs: u64) {
        (**self).record(lines_in_order, total_duration_secs)
    }
}

/// Keeps records in memory; used in tests and when no database is available.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    pub records: Vec<SessionRecord>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRecorder for MemoryRecorder {
    fn record(&mut self, lines_in_order: &[String], total_duration_secs: u64) {
        self.records.push(SessionRecord {
            lines: lines_in_order.to_vec(),
            total_duration_secs,
        });
    }
}
