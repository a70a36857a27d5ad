use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::VecDeque;

/// Produce one pass over `pool`.
///
/// In random order every position is sampled independently from the pool, so a
/// line may appear more than once in a batch (and back to back across batches).
/// Otherwise the pool is returned as-is.
pub fn next_batch<R: Rng + ?Sized>(pool: &[String], random_order: bool, rng: &mut R) -> Vec<String> {
    if !random_order {
        return pool.to_vec();
    }

    (0..pool.len())
        .filter_map(|_| pool.choose(rng).cloned())
        .collect()
}

/// Hands out the lines of a round, refilling from the pool whenever a pass is
/// used up.
#[derive(Debug)]
pub struct LineSequencer<R: Rng = StdRng> {
    pool: Vec<String>,
    random_order: bool,
    pending: VecDeque<String>,
    rng: R,
}

impl LineSequencer<StdRng> {
    pub fn new(pool: Vec<String>, random_order: bool) -> Self {
        Self::with_rng(pool, random_order, StdRng::from_entropy())
    }

    pub fn seeded(pool: Vec<String>, random_order: bool, seed: u64) -> Self {
        Self::with_rng(pool, random_order, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> LineSequencer<R> {
    pub fn with_rng(pool: Vec<String>, random_order: bool, rng: R) -> Self {
        Self {
            pool,
            random_order,
            pending: VecDeque::new(),
            rng,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn next_batch(&mut self) -> Vec<String> {
        next_batch(&self.pool, self.random_order, &mut self.rng)
    }

    /// Start a round with a fresh batch, discarding whatever was left over.
    pub fn start_round(&mut self) {
        self.pending = self.next_batch().into();
    }

    /// Pop the next line, refilling when the current pass is exhausted.
    pub fn next_line(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            let batch = self.next_batch();
            self.pending.extend(batch);
        }
        self.pending.pop_front()
    }

    /// The next `n` lines that `next_line` will return.
    ///
    /// Extra batches generated to fill the preview stay queued, so the preview
    /// matches what is actually spoken.
    pub fn preview(&mut self, n: usize) -> Vec<String> {
        while self.pending.len() < n && !self.pool.is_empty() {
            let batch = self.next_batch();
            self.pending.extend(batch);
        }
        self.pending.iter().take(n).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ordered_batch_is_the_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = pool(&["a", "b", "c"]);
        assert_eq!(next_batch(&p, false, &mut rng), p);
    }

    #[test]
    fn random_batch_has_pool_length_and_only_pool_lines() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = pool(&["a", "b", "c", "d"]);
        for _ in 0..20 {
            let batch = next_batch(&p, true, &mut rng);
            assert_eq!(batch.len(), p.len());
            assert!(batch.iter().all(|line| p.contains(line)));
        }
    }

    #[test]
    fn random_batch_can_repeat_lines() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = pool(&["a", "b"]);
        let repeated = (0..100)
            .map(|_| next_batch(&p, true, &mut rng))
            .any(|batch| batch[0] == batch[1]);
        assert!(repeated, "sampling with replacement should eventually repeat");
    }

    #[test]
    fn empty_pool_yields_nothing() {
        let mut seq = LineSequencer::seeded(vec![], true, 3);
        seq.start_round();
        assert!(seq.is_empty());
        assert_eq!(seq.next_line(), None);
        assert!(seq.preview(5).is_empty());
    }

    #[test]
    fn ordered_sequencer_loops_over_the_pool() {
        let mut seq = LineSequencer::seeded(pool(&["a", "b"]), false, 0);
        seq.start_round();
        let got: Vec<String> = (0..5).filter_map(|_| seq.next_line()).collect();
        assert_eq!(got, vec!["a", "b", "a", "b", "a"]);
    }

    #[test]
    fn preview_matches_what_is_spoken_next() {
        let mut seq = LineSequencer::seeded(pool(&["a", "b", "c"]), true, 42);
        seq.start_round();
        seq.next_line();

        let preview = seq.preview(5);
        assert_eq!(preview.len(), 5);

        let spoken: Vec<String> = (0..5).filter_map(|_| seq.next_line()).collect();
        assert_eq!(preview, spoken);
    }

    #[test]
    fn start_round_discards_leftovers() {
        let mut seq = LineSequencer::seeded(pool(&["a", "b", "c"]), false, 0);
        seq.start_round();
        seq.next_line();
        seq.start_round();
        assert_eq!(seq.next_line().as_deref(), Some("a"));
    }
}
