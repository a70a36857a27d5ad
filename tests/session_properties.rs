use rand::{rngs::StdRng, Rng, SeedableRng};
use voicetrainer::{
    recorder::MemoryRecorder,
    speech::{RecordingSpeechDriver, SpeechCall, UtteranceId},
    Phase, SessionConfig, SessionStateMachine,
};

/// Randomly interleaved ticks, speech completions (current and stale),
/// forced completions and pause toggles. Invariants are checked after
/// every event.

type Machine = SessionStateMachine<RecordingSpeechDriver, MemoryRecorder>;

#[derive(Debug, Clone, Copy)]
enum Event {
    Tick,
    FinishLatest,
    FinishStale,
    ForceComplete,
    TogglePause,
}

fn random_event(rng: &mut StdRng) -> Event {
    match rng.gen_range(0..100) {
        0..=49 => Event::Tick,
        50..=79 => Event::FinishLatest,
        80..=86 => Event::FinishStale,
        87..=93 => Event::ForceComplete,
        _ => Event::TogglePause,
    }
}

fn random_config(rng: &mut StdRng) -> SessionConfig {
    SessionConfig {
        lines: ["jab", "cross", "hook", "uppercut"]
            .iter()
            .take(rng.gen_range(1..=4))
            .map(|s| s.to_string())
            .collect(),
        round_duration_secs: rng.gen_range(1..=8),
        rest_duration_secs: rng.gen_range(0..=4),
        delay_between_lines_secs: rng.gen_range(0..=3),
        round_count: rng.gen_range(1..=3),
        random_order: rng.gen_bool(0.5),
        cooldown_minutes: 0,
        startup_warning_secs: rng.gen_range(0..=2),
        rest_warning_secs: rng.gen_range(0..=3),
    }
}

fn utterance_ids(m: &Machine) -> Vec<UtteranceId> {
    m.driver()
        .calls
        .iter()
        .filter_map(|call| match call {
            SpeechCall::Speak(id, _) => Some(*id),
            _ => None,
        })
        .collect()
}

fn announcements(m: &Machine, round: u32) -> usize {
    let text = format!("End of round {round}");
    m.driver().spoken().iter().filter(|t| **t == text).count()
}

fn apply(m: &mut Machine, event: Event, rng: &mut StdRng) {
    match event {
        Event::Tick => m.on_tick(),
        Event::FinishLatest => {
            if let Some((id, _)) = m.driver().last_utterance() {
                m.on_speech_finished(id);
            }
        }
        Event::FinishStale => {
            let ids = utterance_ids(m);
            if !ids.is_empty() {
                let id = ids[rng.gen_range(0..ids.len())];
                m.on_speech_finished(id);
            }
        }
        Event::ForceComplete => m.force_round_complete(),
        Event::TogglePause => m.toggle_pause(),
    }
}

fn check_invariants(m: &Machine, before: &Snapshot, event: Event) {
    let state = m.state();
    let config = m.config();

    assert!(state.current_round >= before.round, "round went backwards");
    assert!(state.current_round <= config.round_count);

    if before.phase == Phase::StartupCountdown || before.paused || !matches!(event, Event::Tick) {
        assert_eq!(
            state.elapsed_secs, before.elapsed,
            "elapsed changed on {:?} in {:?} (paused: {})",
            event, before.phase, before.paused
        );
    }

    if state.phase == Phase::Resting {
        assert!(state.current_round < config.round_count);
    }

    if state.current_line.is_some() {
        assert_eq!(
            state.spoken_line_history.len() as u64,
            state.total_lines_spoken - 1
        );
    }

    for round in 1..=config.round_count {
        assert!(announcements(m, round) <= 1, "round {round} completed twice");
    }
}

struct Snapshot {
    phase: Phase,
    round: u32,
    elapsed: u64,
    paused: bool,
}

fn snapshot(m: &Machine) -> Snapshot {
    Snapshot {
        phase: m.phase(),
        round: m.state().current_round,
        elapsed: m.state().elapsed_secs,
        paused: m.state().is_paused,
    }
}

fn run_to_completion(m: &mut Machine) {
    if m.state().is_paused {
        m.resume();
    }
    for _ in 0..10_000 {
        if m.phase() == Phase::Completed {
            return;
        }
        let before = snapshot(m);
        m.on_tick();
        check_invariants(m, &before, Event::Tick);
        if let Some((id, _)) = m.driver().last_utterance() {
            m.on_speech_finished(id);
        }
    }
    panic!("session did not complete, stuck in {:?}", m.phase());
}

#[test]
fn invariants_hold_under_random_interleavings() {
    for seed in 0..200u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = random_config(&mut rng);
        let mut m = SessionStateMachine::new(RecordingSpeechDriver::new(), MemoryRecorder::new())
            .with_seed(seed);
        m.start(config.clone());

        for _ in 0..rng.gen_range(0..200) {
            let event = random_event(&mut rng);
            let before = snapshot(&m);
            apply(&mut m, event, &mut rng);
            check_invariants(&m, &before, event);
        }

        if m.is_running() {
            run_to_completion(&mut m);
        }

        for round in 1..=config.round_count {
            assert_eq!(announcements(&m, round), 1, "seed {seed}: round {round}");
        }
        assert_eq!(m.recorder().records.len(), 1, "seed {seed}");
        assert_eq!(
            m.recorder().records[0].total_duration_secs,
            m.state().elapsed_secs
        );
    }
}

#[test]
fn pausable_driver_gets_matching_pause_and_resume() {
    for seed in 0..50u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut m = SessionStateMachine::new(RecordingSpeechDriver::pausable(), MemoryRecorder::new())
            .with_seed(seed);
        m.start(random_config(&mut rng));

        for _ in 0..100 {
            let event = random_event(&mut rng);
            apply(&mut m, event, &mut rng);
        }
        if m.state().is_paused {
            m.resume();
        }

        let pauses = m.driver().count(&SpeechCall::Pause);
        let resumes = m.driver().count(&SpeechCall::Resume);
        assert!(resumes <= pauses, "seed {seed}: resumed more often than paused");
        assert!(
            pauses - resumes <= 1,
            "seed {seed}: pauses left dangling ({pauses} vs {resumes})"
        );
    }
}
