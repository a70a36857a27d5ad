use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::clock::SessionClock;
use crate::speech::{FinishedCallback, UtteranceId};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrainerEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    SpeechFinished(UtteranceId),
}

/// Source of everything that is not a clock tick
pub trait TrainerEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError>;
}

/// Production event source: terminal input plus anything sent through
/// [`CrosstermEventSource::sender`].
pub struct CrosstermEventSource {
    tx: Sender<TrainerEvent>,
    rx: Receiver<TrainerEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if input_tx.send(TrainerEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if input_tx.send(TrainerEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<TrainerEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainerEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Route speech completions into an event channel.
pub fn speech_callback(tx: Sender<TrainerEvent>) -> FinishedCallback {
    let tx = std::sync::Mutex::new(tx);
    std::sync::Arc::new(move |id| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(TrainerEvent::SpeechFinished(id));
        }
    })
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn seconds() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<TrainerEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TrainerEvent>) -> Self {
        Self { rx }
    }
}

impl TrainerEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrainerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long to wait for input while the clock is paused.
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Runner that merges clock ticks and events into one serial stream
pub struct Runner<E: TrainerEventSource> {
    event_source: E,
    clock: SessionClock,
}

impl<E: TrainerEventSource> Runner<E> {
    pub fn new<T: Ticker>(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            clock: SessionClock::new(ticker.interval(), Instant::now()),
        }
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut SessionClock {
        &mut self.clock
    }

    /// Blocks until the next event or clock tick.
    ///
    /// Returns `None` only when the clock is paused and nothing arrived
    /// within a short wait, so callers can redraw.
    pub fn step(&mut self) -> Option<TrainerEvent> {
        loop {
            let now = Instant::now();
            if self.clock.poll(now) {
                return Some(TrainerEvent::Tick);
            }

            let wait = self.clock.time_until_tick(now).unwrap_or(IDLE_WAIT);
            match self.event_source.recv_timeout(wait) {
                Ok(ev) => return Some(ev),
                // Nothing can arrive any more; sleep out the wait instead of spinning.
                Err(RecvTimeoutError::Disconnected) => std::thread::sleep(wait),
                Err(RecvTimeoutError::Timeout) => {}
            }

            if self.clock.is_paused() {
                return None;
            }
        }
    }
}
