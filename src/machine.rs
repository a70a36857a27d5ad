//! The session engine.
//!
//! Two independent sources feed it on one serial context: clock ticks
//! ([`SessionStateMachine::on_tick`]) and speech completions
//! ([`SessionStateMachine::on_speech_finished`]). Either may try to end a
//! round; `Phase::Completing` plus the last completed round number make sure
//! the end-of-round sequence runs once per round. Completions are matched
//! against the id of the utterance being waited on, so anything that was
//! canceled, replaced or belongs to an old session is dropped.

use log::{debug, info, warn};

use crate::recorder::SessionRecorder;
use crate::scheduler::Scheduler;
use crate::sequencer::LineSequencer;
use crate::session::{Phase, RoundEnd, SessionConfig, SessionState};
use crate::speech::{SpeechDriver, UtteranceId};

/// How many upcoming lines are exposed for display.
pub const PREVIEW_LEN: usize = 5;

/// Quiet ticks between the end-of-round announcement and the next phase.
pub const ANNOUNCEMENT_SETTLE_SECS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    NextLine,
    AfterAnnouncement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UtteranceKind {
    Countdown(u32),
    Line,
    Announcement,
    RestWarning(u32),
}

#[derive(Debug, Clone)]
struct Utterance {
    id: UtteranceId,
    kind: UtteranceKind,
    text: String,
}

pub struct SessionStateMachine<D: SpeechDriver, R: SessionRecorder> {
    config: SessionConfig,
    state: SessionState,
    sequencer: LineSequencer,
    scheduler: Scheduler<Continuation>,
    driver: D,
    recorder: R,
    seed: Option<u64>,
    // Never reset, so completions from an earlier session cannot match.
    utterance_counter: u64,
    awaiting: Option<Utterance>,
    interrupted: Option<Utterance>,
    deferred_finish: Option<UtteranceKind>,
    driver_paused: bool,
    suspended: Vec<(Continuation, u32)>,
    last_completed_round: u32,
    last_announced_rest: Option<u32>,
}

impl<D: SpeechDriver, R: SessionRecorder> SessionStateMachine<D, R> {
    pub fn new(driver: D, recorder: R) -> Self {
        Self {
            config: SessionConfig::default(),
            state: SessionState::new(),
            sequencer: LineSequencer::new(Vec::new(), false),
            scheduler: Scheduler::new(),
            driver,
            recorder,
            seed: None,
            utterance_counter: 0,
            awaiting: None,
            interrupted: None,
            deferred_finish: None,
            driver_paused: false,
            suspended: Vec::new(),
            last_completed_round: 0,
            last_announced_rest: None,
        }
    }

    /// Use a fixed seed for line ordering.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// True between `start` and completion or stop.
    pub fn is_running(&self) -> bool {
        !matches!(self.state.phase, Phase::Idle | Phase::Completed)
    }

    pub fn start(&mut self, config: SessionConfig) {
        self.stop();

        if config.lines.is_empty() {
            warn!("not starting a session without any lines");
            return;
        }

        self.sequencer = match self.seed {
            Some(seed) => LineSequencer::seeded(config.lines.clone(), config.random_order, seed),
            None => LineSequencer::new(config.lines.clone(), config.random_order),
        };
        self.config = config;
        info!(
            "session started: {} lines, {} x {}s rounds, {}s rest",
            self.config.lines.len(),
            self.config.round_count,
            self.config.round_duration_secs,
            self.config.rest_duration_secs
        );

        let countdown = self.config.startup_warning_secs;
        if countdown > 0 {
            self.state.phase = Phase::StartupCountdown;
            self.state.startup_countdown_value = Some(countdown);
            self.speak(UtteranceKind::Countdown(countdown), countdown.to_string());
        } else {
            self.begin_round(1);
        }
    }

    /// Abandon the session. Nothing is recorded.
    pub fn stop(&mut self) {
        let was_running = self.is_running();
        self.cancel_pending_work();

        self.state = SessionState::new();
        self.sequencer.clear();
        self.interrupted = None;
        self.deferred_finish = None;
        self.driver_paused = false;
        self.suspended.clear();
        self.last_completed_round = 0;
        self.last_announced_rest = None;

        if was_running {
            info!("session stopped");
        }
    }

    /// `stop`, and forget the last configuration.
    pub fn reset(&mut self) {
        self.stop();
        self.config = SessionConfig::default();
    }

    pub fn pause(&mut self) {
        if self.state.is_paused || !self.is_running() {
            return;
        }
        self.state.is_paused = true;

        if self.awaiting.is_some() {
            if self.driver.supports_pause() {
                self.driver.pause();
                self.driver_paused = true;
            } else {
                self.driver.cancel();
                self.interrupted = self.awaiting.take();
            }
        }
        self.suspended = self.scheduler.drain();
        info!("paused in {:?}", self.state.phase);
    }

    pub fn resume(&mut self) {
        if !self.state.is_paused {
            return;
        }
        self.state.is_paused = false;
        info!("resumed in {:?}", self.state.phase);

        for (continuation, ticks) in std::mem::take(&mut self.suspended) {
            self.scheduler.schedule(continuation, ticks);
        }
        self.state.next_line_gap_countdown = self.scheduler.remaining(Continuation::NextLine);

        if self.driver_paused {
            self.driver_paused = false;
            self.driver.resume();
        }

        if let Some(kind) = self.deferred_finish.take() {
            self.after_utterance(kind);
        } else if let Some(utterance) = self.interrupted.take() {
            match utterance.kind {
                // Stale by now; the next tick announces the current value.
                UtteranceKind::RestWarning(_) => {}
                kind => self.speak(kind, utterance.text),
            }
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.state.is_paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// End the current round now, as if its time had run out.
    pub fn force_round_complete(&mut self) {
        if self.state.is_paused {
            debug!("ignoring round completion request while paused");
            return;
        }
        self.complete_round();
    }

    pub fn on_tick(&mut self) {
        if self.state.is_paused || !self.state.phase.counts_elapsed() {
            return;
        }
        self.state.elapsed_secs += 1;

        match self.state.phase {
            Phase::Speaking | Phase::InterLineGap => {
                self.state.round_time_remaining_secs =
                    self.state.round_time_remaining_secs.saturating_sub(1);
                if self.state.round_time_remaining_secs == 0 {
                    self.complete_round();
                    return;
                }
            }
            Phase::Completing(RoundEnd::Rest) => {
                self.state.rest_or_cooldown_remaining_secs =
                    self.state.rest_or_cooldown_remaining_secs.saturating_sub(1);
            }
            Phase::Resting => {
                self.state.rest_or_cooldown_remaining_secs =
                    self.state.rest_or_cooldown_remaining_secs.saturating_sub(1);
                let remaining = self.state.rest_or_cooldown_remaining_secs;
                if remaining == 0 {
                    self.begin_round(self.state.current_round + 1);
                    return;
                }
                self.announce_rest(remaining);
            }
            Phase::CoolingDown => {
                self.state.rest_or_cooldown_remaining_secs =
                    self.state.rest_or_cooldown_remaining_secs.saturating_sub(1);
                if self.state.rest_or_cooldown_remaining_secs == 0 {
                    self.complete_session();
                    return;
                }
            }
            Phase::Completing(_) | Phase::Idle | Phase::StartupCountdown | Phase::Completed => {}
        }

        for continuation in self.scheduler.advance() {
            self.run_continuation(continuation);
        }
        self.state.next_line_gap_countdown = self.scheduler.remaining(Continuation::NextLine);
    }

    pub fn on_speech_finished(&mut self, id: UtteranceId) {
        let utterance = match self.awaiting.take() {
            Some(utterance) if utterance.id == id => utterance,
            other => {
                self.awaiting = other;
                debug!("ignoring stale speech completion {:?}", id);
                return;
            }
        };

        if self.state.is_paused {
            self.deferred_finish = Some(utterance.kind);
            return;
        }
        self.after_utterance(utterance.kind);
    }

    fn after_utterance(&mut self, kind: UtteranceKind) {
        match kind {
            UtteranceKind::Countdown(value) => {
                if self.state.phase != Phase::StartupCountdown {
                    return;
                }
                if value > 1 {
                    let next = value - 1;
                    self.state.startup_countdown_value = Some(next);
                    self.speak(UtteranceKind::Countdown(next), next.to_string());
                } else {
                    self.state.startup_countdown_value = None;
                    self.begin_round(1);
                }
            }
            UtteranceKind::Line => {
                if self.state.phase != Phase::Speaking {
                    return;
                }
                let delay = self.config.delay_between_lines_secs;
                if delay > 1 {
                    self.state.phase = Phase::InterLineGap;
                    self.scheduler.schedule(Continuation::NextLine, delay);
                    self.state.next_line_gap_countdown = Some(delay);
                } else {
                    self.dispatch_next_line();
                }
            }
            UtteranceKind::Announcement => {
                if matches!(self.state.phase, Phase::Completing(_)) {
                    self.scheduler
                        .schedule(Continuation::AfterAnnouncement, ANNOUNCEMENT_SETTLE_SECS);
                }
            }
            UtteranceKind::RestWarning(_) => {}
        }
    }

    fn run_continuation(&mut self, continuation: Continuation) {
        match continuation {
            Continuation::NextLine => {
                if self.state.phase == Phase::InterLineGap {
                    self.dispatch_next_line();
                }
            }
            Continuation::AfterAnnouncement => self.resolve_round_end(),
        }
    }

    fn begin_round(&mut self, round: u32) {
        self.cancel_pending_work();
        self.state.current_round = round;
        self.state.round_time_remaining_secs = self.config.round_duration_secs;
        self.state.rest_or_cooldown_remaining_secs = 0;
        self.state.next_line_gap_countdown = None;
        self.last_announced_rest = None;
        self.sequencer.start_round();
        self.state.phase = Phase::Speaking;
        info!("round {}/{} started", round, self.config.round_count);

        self.dispatch_next_line();
    }

    fn dispatch_next_line(&mut self) {
        if !self.state.phase.is_round_active() {
            return;
        }
        if self.state.round_time_remaining_secs == 0 {
            self.complete_round();
            return;
        }

        let Some(line) = self.sequencer.next_line() else {
            warn!("line pool is empty, ending round {}", self.state.current_round);
            self.complete_round();
            return;
        };

        self.state.total_lines_spoken += 1;
        self.state.retire_current_line();
        self.state.current_line = Some(line.clone());
        self.state.upcoming_preview = self.sequencer.preview(PREVIEW_LEN);
        self.state.next_line_gap_countdown = None;
        self.state.phase = Phase::Speaking;

        self.speak(UtteranceKind::Line, line);
    }

    fn complete_round(&mut self) {
        let round = self.state.current_round;
        if !self.state.phase.is_round_active() || round <= self.last_completed_round {
            debug!(
                "round {} completion already in progress or done ({:?}), ignoring",
                round, self.state.phase
            );
            return;
        }
        self.last_completed_round = round;

        self.cancel_pending_work();
        self.state.next_line_gap_countdown = None;
        self.state.retire_current_line();

        let end = if self.config.rests_after(round) {
            RoundEnd::Rest
        } else if round < self.config.round_count {
            RoundEnd::NextRound
        } else if self.config.cooldown_minutes > 0 {
            RoundEnd::Cooldown
        } else {
            RoundEnd::Finish
        };

        // Rest starts counting now so it never lags the round timer.
        if end == RoundEnd::Rest {
            self.state.rest_or_cooldown_remaining_secs = self.config.rest_duration_secs;
            self.last_announced_rest = None;
        }

        self.state.phase = Phase::Completing(end);
        info!("round {} complete, then {:?}", round, end);
        self.speak(UtteranceKind::Announcement, format!("End of round {round}"));
    }

    fn resolve_round_end(&mut self) {
        let Phase::Completing(end) = self.state.phase else {
            return;
        };
        let round = self.state.current_round;

        match end {
            RoundEnd::Rest if self.state.rest_or_cooldown_remaining_secs == 0 => {
                self.begin_round(round + 1)
            }
            RoundEnd::Rest => {
                self.state.phase = Phase::Resting;
                info!(
                    "resting for {}s before round {}",
                    self.state.rest_or_cooldown_remaining_secs,
                    round + 1
                );
                self.announce_rest(self.state.rest_or_cooldown_remaining_secs);
            }
            RoundEnd::NextRound => self.begin_round(round + 1),
            RoundEnd::Cooldown => {
                self.state.rest_or_cooldown_remaining_secs = self.config.cooldown_secs();
                self.state.current_line = None;
                self.state.upcoming_preview.clear();
                self.state.phase = Phase::CoolingDown;
                info!("cooling down for {}s", self.state.rest_or_cooldown_remaining_secs);
            }
            RoundEnd::Finish => self.complete_session(),
        }
    }

    fn complete_session(&mut self) {
        self.cancel_pending_work();
        self.state.retire_current_line();
        self.state.upcoming_preview.clear();
        self.state.next_line_gap_countdown = None;
        self.state.phase = Phase::Completed;

        let lines = self.state.lines_in_order();
        info!(
            "session completed: {} lines in {}s",
            lines.len(),
            self.state.elapsed_secs
        );
        self.recorder.record(&lines, self.state.elapsed_secs);
    }

    fn announce_rest(&mut self, remaining: u32) {
        if remaining > self.config.rest_warning_secs || self.last_announced_rest == Some(remaining) {
            return;
        }
        self.last_announced_rest = Some(remaining);
        self.speak(UtteranceKind::RestWarning(remaining), remaining.to_string());
    }

    fn speak(&mut self, kind: UtteranceKind, text: String) {
        if self.awaiting.take().is_some() {
            self.driver.cancel();
        }
        self.utterance_counter += 1;
        let utterance = Utterance {
            id: UtteranceId(self.utterance_counter),
            kind,
            text,
        };
        debug!("speaking {:?}: {}", utterance.kind, utterance.text);
        self.driver.speak(utterance.id, &utterance.text);
        self.awaiting = Some(utterance);
    }

    /// Silence the driver and drop every scheduled continuation.
    fn cancel_pending_work(&mut self) {
        if self.awaiting.take().is_some() || self.driver_paused {
            self.driver.cancel();
        }
        self.driver_paused = false;
        self.scheduler.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::MemoryRecorder;
    use crate::speech::{RecordingSpeechDriver, SpeechCall};

    type Machine = SessionStateMachine<RecordingSpeechDriver, MemoryRecorder>;

    fn machine() -> Machine {
        SessionStateMachine::new(RecordingSpeechDriver::new(), MemoryRecorder::new()).with_seed(11)
    }

    fn config(lines: &[&str]) -> SessionConfig {
        SessionConfig {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            round_duration_secs: 10,
            rest_duration_secs: 0,
            delay_between_lines_secs: 0,
            round_count: 1,
            random_order: false,
            cooldown_minutes: 0,
            startup_warning_secs: 0,
            rest_warning_secs: 0,
        }
    }

    fn finish_latest(m: &mut Machine) {
        let (id, _) = m.driver().last_utterance().expect("something was spoken");
        m.on_speech_finished(id);
    }

    #[test]
    fn empty_script_does_not_start() {
        let mut m = machine();
        m.start(config(&[]));
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.driver().calls.is_empty());
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut m = machine();
        m.start(config(&["a", "b"]));
        let (first, _) = m.driver().last_utterance().unwrap();
        finish_latest(&mut m);
        assert_eq!(m.state().current_line.as_deref(), Some("b"));

        m.on_speech_finished(first);
        assert_eq!(m.state().current_line.as_deref(), Some("b"));
        assert_eq!(m.state().total_lines_spoken, 2);
    }

    #[test]
    fn forced_completion_after_expiry_is_suppressed() {
        let mut m = machine();
        m.start(config(&["a"]));
        for _ in 0..10 {
            m.on_tick();
        }
        assert_eq!(m.phase(), Phase::Completing(RoundEnd::Finish));

        m.force_round_complete();
        let announcements = m
            .driver()
            .spoken()
            .iter()
            .filter(|t| t.starts_with("End of round"))
            .count();
        assert_eq!(announcements, 1);
    }

    #[test]
    fn one_second_delay_continues_immediately() {
        let mut m = machine();
        let mut cfg = config(&["a", "b"]);
        cfg.delay_between_lines_secs = 1;
        m.start(cfg);
        finish_latest(&mut m);
        assert_eq!(m.phase(), Phase::Speaking);
        assert_eq!(m.state().current_line.as_deref(), Some("b"));
    }

    #[test]
    fn rest_warning_speaks_each_value_once() {
        let mut m = machine();
        let mut cfg = config(&["a"]);
        cfg.round_count = 2;
        cfg.round_duration_secs = 1;
        cfg.rest_duration_secs = 6;
        cfg.rest_warning_secs = 3;
        m.start(cfg);

        m.on_tick(); // round 1 ends, rest 6
        finish_latest(&mut m); // announcement done
        m.on_tick(); // rest 5, settle resolves -> Resting
        assert_eq!(m.phase(), Phase::Resting);
        m.on_tick(); // 4
        m.on_tick(); // 3
        m.on_tick(); // 2
        m.on_tick(); // 1

        let spoken = m.driver().spoken();
        let warnings: Vec<&str> = spoken
            .iter()
            .map(String::as_str)
            .filter(|t| t.parse::<u32>().is_ok())
            .collect();
        assert_eq!(warnings, vec!["3", "2", "1"]);
        assert!(m.driver().count(&SpeechCall::Cancel) >= 2);

        m.on_tick(); // 0 -> round 2
        assert_eq!(m.phase(), Phase::Speaking);
        assert_eq!(m.state().current_round, 2);
    }

    #[test]
    fn rest_warning_covers_the_first_resting_second() {
        let mut m = machine();
        let mut cfg = config(&["a"]);
        cfg.round_count = 2;
        cfg.round_duration_secs = 1;
        cfg.rest_duration_secs = 5;
        cfg.rest_warning_secs = 5;
        m.start(cfg);

        m.on_tick(); // round 1 ends, rest 5
        finish_latest(&mut m);
        m.on_tick(); // rest 4, settle resolves -> Resting
        assert_eq!(m.phase(), Phase::Resting);
        assert_eq!(m.driver().last_utterance().unwrap().1, "4");

        while m.phase() == Phase::Resting {
            m.on_tick();
        }
        assert_eq!(m.state().current_round, 2);

        let spoken = m.driver().spoken();
        let warnings: Vec<&str> = spoken
            .iter()
            .map(String::as_str)
            .filter(|t| t.parse::<u32>().is_ok())
            .collect();
        assert_eq!(warnings, vec!["4", "3", "2", "1"]);
    }

    #[test]
    fn completion_while_paused_is_applied_on_resume() {
        let mut m = SessionStateMachine::new(RecordingSpeechDriver::pausable(), MemoryRecorder::new());
        m.start(config(&["a", "b"]));
        m.pause();
        assert_eq!(m.driver().count(&SpeechCall::Pause), 1);

        finish_latest(&mut m);
        assert_eq!(m.state().current_line.as_deref(), Some("a"));

        m.resume();
        assert_eq!(m.driver().count(&SpeechCall::Resume), 1);
        assert_eq!(m.state().current_line.as_deref(), Some("b"));
    }

    #[test]
    fn reset_forgets_configuration() {
        let mut m = machine();
        m.start(config(&["a"]));
        m.reset();
        assert_eq!(m.config(), &SessionConfig::default());
        assert_eq!(m.state(), &SessionState::new());
    }
}
