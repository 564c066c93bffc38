//! Per-run artifact directories. Writes are fire-and-forget: a failure is
//! logged and the run carries on.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

pub trait TraceSink: Send + Sync {
    fn write_text(&self, name: &str, content: &str);

    fn write_binary(&self, name: &str, bytes: &[u8]);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn write_text(&self, _name: &str, _content: &str) {}

    fn write_binary(&self, _name: &str, _bytes: &[u8]) {}
}

/// A trace run stored as `<root>/<UTC timestamp>[_<n>]/`.
#[derive(Debug, Clone)]
pub struct FsTrace {
    dir: PathBuf,
}

impl FsTrace {
    /// Allocate a fresh run directory under `root`.
    pub fn create_run(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();

        let mut suffix = 0usize;
        loop {
            let name = if suffix == 0 {
                stamp.clone()
            } else {
                format!("{stamp}_{suffix}")
            };
            let dir = root.join(name);
            match std::fs::create_dir(&dir) {
                Ok(()) => {
                    info!(target: "trace", dir = %dir.display(), "trace run created");
                    return Ok(Self { dir });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, name: &str, bytes: &[u8]) {
        let path = self.dir.join(name);
        if let Err(e) = std::fs::write(&path, bytes) {
            warn!(target: "trace", path = %path.display(), "trace write failed: {e}");
        }
    }
}

impl TraceSink for FsTrace {
    fn write_text(&self, name: &str, content: &str) {
        self.write(name, content.as_bytes());
    }

    fn write_binary(&self, name: &str, bytes: &[u8]) {
        self.write(name, bytes);
    }
}

/// Open a trace run, or fall back to discarding artifacts.
pub fn open_or_null(root: &Path) -> Box<dyn TraceSink> {
    match FsTrace::create_run(root) {
        Ok(trace) => Box::new(trace),
        Err(e) => {
            warn!(target: "trace", root = %root.display(), "tracing disabled: {e}");
            Box::new(NullTrace)
        }
    }
}
