use std::fs::{self, OpenOptions};
use std::path::Path;

use env_logger::{Builder, Target};

/// Send log output to `path`, since the terminal UI owns stdout and stderr.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_file_logger(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let _ = Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(Target::Pipe(Box::new(file)))
        .try_init();
    Ok(())
}
