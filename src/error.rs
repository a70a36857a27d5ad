use thiserror::Error;

/// Settings that cannot produce a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("the script has no non-blank lines")]
    EmptyScript,
    #[error("round duration must be at least one second")]
    ZeroRoundDuration,
    #[error("a session needs at least one round")]
    ZeroRoundCount,
    #[error("unknown built-in script '{0}'")]
    UnknownScript(String),
}
