use include_dir::{include_dir, Dir};
use serde::Deserialize;

use crate::error::ConfigError;

static SCRIPT_DIR: Dir = include_dir!("src/scripts");

/// A line script shipped with the binary.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Script {
    pub name: String,
    pub title: String,
    pub lines: Vec<String>,
}

impl Script {
    pub fn builtin(name: &str) -> Result<Self, ConfigError> {
        SCRIPT_DIR
            .get_file(format!("{name}.json"))
            .and_then(|file| file.contents_utf8())
            .and_then(|contents| serde_json::from_str(contents).ok())
            .ok_or_else(|| ConfigError::UnknownScript(name.to_string()))
    }

    /// Names of all built-in scripts, sorted.
    pub fn builtin_names() -> Vec<String> {
        let mut names: Vec<String> = SCRIPT_DIR
            .files()
            .filter(|file| file.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|file| file.path().file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn default_name() -> &'static str {
        "boxing"
    }
}
