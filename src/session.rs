use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Immutable settings for one training session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub lines: Vec<String>,
    pub round_duration_secs: u32,
    pub rest_duration_secs: u32,
    pub delay_between_lines_secs: u32,
    pub round_count: u32,
    pub random_order: bool,
    pub cooldown_minutes: u32,
    pub startup_warning_secs: u32,
    pub rest_warning_secs: u32,
}

impl SessionConfig {
    /// Whether this session rests after finishing `round`.
    pub fn rests_after(&self, round: u32) -> bool {
        round < self.round_count && self.rest_duration_secs > 0
    }

    pub fn cooldown_secs(&self) -> u32 {
        self.cooldown_minutes.saturating_mul(60)
    }
}

/// Split source text into spoken lines, dropping blank ones.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// What happens once the end-of-round announcement has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEnd {
    Rest,
    NextRound,
    Cooldown,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display)]
pub enum Phase {
    #[default]
    Idle,
    #[strum(to_string = "Get ready")]
    StartupCountdown,
    Speaking,
    #[strum(to_string = "Between lines")]
    InterLineGap,
    /// A round has ended and its announcement is in flight.
    #[strum(to_string = "Round complete")]
    Completing(RoundEnd),
    Resting,
    #[strum(to_string = "Cooling down")]
    CoolingDown,
    Completed,
}

impl Phase {
    pub fn is_round_active(&self) -> bool {
        matches!(self, Phase::Speaking | Phase::InterLineGap)
    }

    /// Phases in which clock ticks count towards elapsed time.
    pub fn counts_elapsed(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::StartupCountdown | Phase::Completed)
    }
}

/// Observable state of a session. Only the state machine mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,
    pub current_round: u32,
    pub round_time_remaining_secs: u32,
    pub rest_or_cooldown_remaining_secs: u32,
    pub elapsed_secs: u64,
    pub current_line: Option<String>,
    /// Most recent first.
    pub spoken_line_history: VecDeque<String>,
    pub upcoming_preview: Vec<String>,
    pub is_paused: bool,
    pub total_lines_spoken: u64,
    pub startup_countdown_value: Option<u32>,
    pub next_line_gap_countdown: Option<u32>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds shown on the main timer for the current phase.
    pub fn active_countdown(&self) -> Option<u32> {
        match self.phase {
            Phase::StartupCountdown => self.startup_countdown_value,
            Phase::Speaking | Phase::InterLineGap => Some(self.round_time_remaining_secs),
            Phase::Completing(RoundEnd::Rest) | Phase::Resting | Phase::CoolingDown => {
                Some(self.rest_or_cooldown_remaining_secs)
            }
            _ => None,
        }
    }

    /// Retire the current line into the history, if there is one.
    pub(crate) fn retire_current_line(&mut self) {
        if let Some(line) = self.current_line.take() {
            self.spoken_line_history.push_front(line);
        }
    }

    /// Spoken lines in the order they were dispatched.
    pub fn lines_in_order(&self) -> Vec<String> {
        self.spoken_line_history.iter().rev().cloned().collect()
    }
}
