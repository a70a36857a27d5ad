/// Delayed continuations counted in clock ticks.
///
/// Nothing runs by itself: the owner calls [`Scheduler::advance`] once per
/// tick and acts on whatever became due.
#[derive(Debug, Clone)]
pub struct Scheduler<C> {
    entries: Vec<Scheduled<C>>,
}

#[derive(Debug, Clone)]
struct Scheduled<C> {
    continuation: C,
    remaining_ticks: u32,
}

impl<C: Copy + PartialEq> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Schedule `continuation` to become due after `ticks` ticks. Zero ticks
    /// means due on the next tick.
    pub fn schedule(&mut self, continuation: C, ticks: u32) {
        self.entries.push(Scheduled {
            continuation,
            remaining_ticks: ticks.max(1),
        });
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    /// Cancel everything, returning each continuation with its remaining ticks
    /// so it can be scheduled again later.
    pub fn drain(&mut self) -> Vec<(C, u32)> {
        self.entries
            .drain(..)
            .map(|entry| (entry.continuation, entry.remaining_ticks))
            .collect()
    }

    /// Count one tick down and return the continuations that are now due, in
    /// the order they were scheduled.
    pub fn advance(&mut self) -> Vec<C> {
        let mut due = Vec::new();
        self.entries.retain_mut(|entry| {
            entry.remaining_ticks = entry.remaining_ticks.saturating_sub(1);
            if entry.remaining_ticks == 0 {
                due.push(entry.continuation);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn remaining(&self, continuation: C) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.continuation == continuation)
            .map(|entry| entry.remaining_ticks)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Copy + PartialEq> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}
