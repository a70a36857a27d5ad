use voicetrainer::{
    history::HistoryDb,
    speech::RecordingSpeechDriver,
    SessionConfig, SessionStateMachine,
};

/// Integration tests for session history: completed sessions land in the
/// database through the recorder seam, stopped ones never do.

fn config() -> SessionConfig {
    SessionConfig {
        lines: vec!["breathe in".into(), "breathe out".into()],
        round_duration_secs: 4,
        rest_duration_secs: 0,
        delay_between_lines_secs: 0,
        round_count: 1,
        random_order: false,
        cooldown_minutes: 0,
        startup_warning_secs: 0,
        rest_warning_secs: 0,
    }
}

fn run_session(machine: &mut SessionStateMachine<RecordingSpeechDriver, HistoryDb>) {
    machine.start(config());
    let (id, _) = machine.driver().last_utterance().unwrap();
    machine.on_speech_finished(id);
    for _ in 0..4 {
        machine.on_tick();
    }
    let (id, _) = machine.driver().last_utterance().unwrap();
    machine.on_speech_finished(id);
    machine.on_tick();
}

#[test]
fn completed_session_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");

    let db = HistoryDb::open(&path).unwrap();
    let mut machine = SessionStateMachine::new(RecordingSpeechDriver::new(), db);
    run_session(&mut machine);
    drop(machine);

    let db = HistoryDb::open(&path).unwrap();
    let sessions = db.recent_sessions(10).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration_secs, 5);
    assert_eq!(sessions[0].line_count, 2);
    assert_eq!(
        db.lines_for_session(sessions[0].id).unwrap(),
        vec!["breathe in", "breathe out"]
    );
}

#[test]
fn stopped_session_is_not_persisted() {
    let db = HistoryDb::open_in_memory().unwrap();
    let mut machine = SessionStateMachine::new(RecordingSpeechDriver::new(), db);

    machine.start(config());
    machine.on_tick();
    machine.stop();

    assert!(machine.recorder().recent_sessions(10).unwrap().is_empty());
}

#[test]
fn export_csv_writes_one_row_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let db = HistoryDb::open_in_memory().unwrap();
    let mut machine = SessionStateMachine::new(RecordingSpeechDriver::new(), db);
    run_session(&mut machine);
    run_session(&mut machine);

    let csv_path = dir.path().join("export.csv");
    let rows = machine.recorder().export_csv(&csv_path).unwrap();
    assert_eq!(rows, 2);

    let text = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,completed_at,duration_secs,line_count")
    );
    assert_eq!(lines.count(), 2);
}
