use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Identifies one `speak` request. Ids only ever increase within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtteranceId(pub u64);

/// Called exactly once when an utterance finishes, unless it was canceled.
pub type FinishedCallback = Arc<dyn Fn(UtteranceId) + Send + Sync>;

/// Something that can read a line aloud.
pub trait SpeechDriver {
    fn speak(&mut self, id: UtteranceId, text: &str);

    /// Stop immediately and suppress the pending completion.
    fn cancel(&mut self);

    /// Whether `pause`/`resume` can hold an utterance mid-way.
    fn supports_pause(&self) -> bool {
        false
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}
}

impl<T: SpeechDriver + ?Sized> SpeechDriver for Box<T> {
    fn speak(&mut self, id: UtteranceId, text: &str) {
        (**self).speak(id, text)
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn supports_pause(&self) -> bool {
        (**self).supports_pause()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }
}

/// Sentinel for "no utterance is current".
const NONE_ACTIVE: u64 = 0;

/// Speaks through an external program, one child process per utterance.
pub struct CommandSpeechDriver {
    program: String,
    args: Vec<String>,
    on_finished: FinishedCallback,
    active: Arc<AtomicU64>,
    child: Arc<Mutex<Option<Child>>>,
}

impl CommandSpeechDriver {
    /// `command` is split on whitespace; the text to speak is appended as the
    /// last argument.
    pub fn new(command: &str, on_finished: FinishedCallback) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            on_finished,
            active: Arc::new(AtomicU64::new(NONE_ACTIVE)),
            child: Arc::new(Mutex::new(None)),
        })
    }

    pub fn default_command() -> &'static str {
        if cfg!(target_os = "macos") {
            "say"
        } else {
            "espeak-ng"
        }
    }

    fn kill_child(&self) {
        if let Ok(mut guard) = self.child.lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl SpeechDriver for CommandSpeechDriver {
    fn speak(&mut self, id: UtteranceId, text: &str) {
        // Swap the active id first so the previous watcher cannot report.
        self.active.store(id.0, Ordering::SeqCst);
        self.kill_child();

        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                log::error!("failed to run speech command '{}': {}", self.program, e);
                // Keep the session moving even without audio.
                if self.active.load(Ordering::SeqCst) == id.0 {
                    (self.on_finished)(id);
                }
                return;
            }
        };

        if let Ok(mut guard) = self.child.lock() {
            *guard = Some(child);
        }

        let active = self.active.clone();
        let child = self.child.clone();
        let on_finished = self.on_finished.clone();
        thread::spawn(move || loop {
            let finished = match child.lock() {
                Ok(mut guard) => match guard.as_mut() {
                    Some(c) => match c.try_wait() {
                        Ok(Some(_)) => {
                            guard.take();
                            true
                        }
                        Ok(None) => false,
                        Err(_) => {
                            guard.take();
                            true
                        }
                    },
                    // Killed by cancel or replaced by a newer utterance.
                    None => true,
                },
                Err(_) => true,
            };

            if finished {
                if active
                    .compare_exchange(id.0, NONE_ACTIVE, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    on_finished(id);
                }
                break;
            }
            thread::sleep(Duration::from_millis(20));
        });
    }

    fn cancel(&mut self) {
        self.active.store(NONE_ACTIVE, Ordering::SeqCst);
        self.kill_child();
    }
}

impl Drop for CommandSpeechDriver {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Silent driver that "finishes" after an estimated reading time.
pub struct SimulatedSpeechDriver {
    words_per_minute: u32,
    on_finished: FinishedCallback,
    active: Arc<AtomicU64>,
}

impl SimulatedSpeechDriver {
    pub const MIN_UTTERANCE: Duration = Duration::from_millis(300);

    pub fn new(words_per_minute: u32, on_finished: FinishedCallback) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
            on_finished,
            active: Arc::new(AtomicU64::new(NONE_ACTIVE)),
        }
    }

    pub fn reading_time(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count().max(1) as u64;
        let millis = words * 60_000 / self.words_per_minute as u64;
        Duration::from_millis(millis).max(Self::MIN_UTTERANCE)
    }
}

impl SpeechDriver for SimulatedSpeechDriver {
    fn speak(&mut self, id: UtteranceId, text: &str) {
        self.active.store(id.0, Ordering::SeqCst);
        let wait = self.reading_time(text);
        let active = self.active.clone();
        let on_finished = self.on_finished.clone();
        thread::spawn(move || {
            thread::sleep(wait);
            if active
                .compare_exchange(id.0, NONE_ACTIVE, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                on_finished(id);
            }
        });
    }

    fn cancel(&mut self) {
        self.active.store(NONE_ACTIVE, Ordering::SeqCst);
    }
}

/// Calls made on a [`RecordingSpeechDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechCall {
    Speak(UtteranceId, String),
    Cancel,
    Pause,
    Resume,
}

/// In-memory driver for tests: records every call and never finishes on its
/// own. Deliver completions by hand.
#[derive(Debug, Default)]
pub struct RecordingSpeechDriver {
    pub calls: Vec<SpeechCall>,
    pausable: bool,
}

impl RecordingSpeechDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pausable() -> Self {
        Self {
            calls: Vec::new(),
            pausable: true,
        }
    }

    /// Texts passed to `speak`, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SpeechCall::Speak(_, text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// The id and text of the latest `speak` call.
    pub fn last_utterance(&self) -> Option<(UtteranceId, String)> {
        self.calls.iter().rev().find_map(|call| match call {
            SpeechCall::Speak(id, text) => Some((*id, text.clone())),
            _ => None,
        })
    }

    pub fn count(&self, wanted: &SpeechCall) -> usize {
        self.calls.iter().filter(|call| *call == wanted).count()
    }
}

impl SpeechDriver for RecordingSpeechDriver {
    fn speak(&mut self, id: UtteranceId, text: &str) {
        self.calls.push(SpeechCall::Speak(id, text.to_string()));
    }

    fn cancel(&mut self) {
        self.calls.push(SpeechCall::Cancel);
    }

    fn supports_pause(&self) -> bool {
        self.pausable
    }

    fn pause(&mut self) {
        self.calls.push(SpeechCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.push(SpeechCall::Resume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn channel_callback() -> (FinishedCallback, mpsc::Receiver<UtteranceId>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let cb: FinishedCallback = Arc::new(move |id| {
            let _ = tx.lock().map(|tx| tx.send(id));
        });
        (cb, rx)
    }

    #[test]
    fn reading_time_scales_with_words() {
        let (cb, _rx) = channel_callback();
        let driver = SimulatedSpeechDriver::new(600, cb);

        assert_eq!(driver.reading_time("one"), SimulatedSpeechDriver::MIN_UTTERANCE);
        assert_eq!(
            driver.reading_time("one two three four five six"),
            Duration::from_millis(600)
        );
    }

    #[test]
    fn simulated_driver_reports_completion() {
        let (cb, rx) = channel_callback();
        let mut driver = SimulatedSpeechDriver::new(60_000, cb);

        driver.speak(UtteranceId(1), "go");
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(UtteranceId(1)));
    }

    #[test]
    fn simulated_driver_cancel_suppresses_completion() {
        let (cb, rx) = channel_callback();
        let mut driver = SimulatedSpeechDriver::new(60_000, cb);

        driver.speak(UtteranceId(1), "go");
        driver.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(600)).is_err());
    }

    #[test]
    fn newer_utterance_supersedes_older_one() {
        let (cb, rx) = channel_callback();
        let mut driver = SimulatedSpeechDriver::new(60_000, cb);

        driver.speak(UtteranceId(1), "first");
        driver.speak(UtteranceId(2), "second");
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(UtteranceId(2)));
        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    }

    #[test]
    fn command_driver_rejects_empty_command() {
        let (cb, _rx) = channel_callback();
        assert!(CommandSpeechDriver::new("   ", cb).is_none());
    }

    #[test]
    fn missing_speech_program_still_completes() {
        let (cb, rx) = channel_callback();
        let mut driver =
            CommandSpeechDriver::new("voicetrainer-no-such-program --rate 1", cb).unwrap();

        driver.speak(UtteranceId(9), "hello");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(UtteranceId(9)));
    }

    #[cfg(unix)]
    #[test]
    fn command_driver_reports_finished_process() {
        let (cb, rx) = channel_callback();
        let mut driver = CommandSpeechDriver::new("true", cb).unwrap();

        driver.speak(UtteranceId(4), "ignored");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(UtteranceId(4)));
    }

    #[cfg(unix)]
    #[test]
    fn command_driver_cancel_kills_without_completion() {
        let (cb, rx) = channel_callback();
        let mut driver = CommandSpeechDriver::new("sleep", cb).unwrap();

        driver.speak(UtteranceId(5), "5");
        driver.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn recording_driver_tracks_calls() {
        let mut driver = RecordingSpeechDriver::new();
        driver.speak(UtteranceId(1), "a");
        driver.cancel();
        driver.speak(UtteranceId(2), "b");

        assert_eq!(driver.spoken(), vec!["a", "b"]);
        assert_eq!(driver.last_utterance(), Some((UtteranceId(2), "b".to_string())));
        assert_eq!(driver.count(&SpeechCall::Cancel), 1);
        assert!(!driver.supports_pause());
        assert!(RecordingSpeechDriver::pausable().supports_pause());
    }
}
