// Library surface: the session engine and its adapters. The terminal UI
// lives in the binary and only talks to these modules.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod machine;
pub mod recorder;
pub mod runtime;
pub mod scheduler;
pub mod scripts;
pub mod sequencer;
pub mod session;
pub mod speech;
pub mod util;

pub use machine::SessionStateMachine;
pub use session::{Phase, RoundEnd, SessionConfig, SessionState};
