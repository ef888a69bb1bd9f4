//! Diagnostics: the `tracing` subscriber and the per-run log file.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Environment variable silencing the backend load banner.
pub const SILENT_LOAD_ENV: &str = "VFC_BACKENDS_SILENT_LOAD";

/// Installs a stderr subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Does nothing when a subscriber is already installed.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Whether the load banner of the backends must be printed.
pub fn banner_enabled() -> bool {
    !is_silent(std::env::var(SILENT_LOAD_ENV).ok().as_deref())
}

fn is_silent(value: Option<&str>) -> bool {
    value.is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

/// Log file shared by all the threads of the instrumented program.
///
/// Lines are indented with one tab per level of call depth.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl LogFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|err| Error::io(path, err))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&self, depth: usize, line: impl Display) -> Result<()> {
        let mut writer = self.writer.lock();
        let indent = "\t".repeat(depth);
        writeln!(writer, "{indent}{line}").map_err(|err| Error::io(&self.path, err))
    }

    pub fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|err| Error::io(&self.path, err))
    }
}
