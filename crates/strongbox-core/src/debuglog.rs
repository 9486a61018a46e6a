use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;

const LOG_FILE: &str = "strongbox.log";

/// Rotation threshold. The server-side diagnostics upload caps attachments,
/// so the local file never grows past this.
const MAX_LOG_SIZE: u64 = 100 * 1024;

struct LogState {
    path: PathBuf,
    file: File,
}

static LOG: Lazy<Mutex<Option<LogState>>> = Lazy::new(|| Mutex::new(None));

/// Opens (or creates) the rotating debug log under the root directory.
/// Safe to call once per process; later calls re-point the log.
pub fn debug_log_init(root_dir: &Path) -> std::io::Result<()> {
    let path = root_dir.join(LOG_FILE);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.seek(SeekFrom::End(0))?;

    let mut guard = LOG.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(LogState { path, file });
    Ok(())
}

/// Appends a timestamped line, rotating (truncate and restart) at 100 KB.
/// Also mirrors the line to the tracing subscriber.
pub fn debug_log(message: &str) {
    tracing::debug!(target: "strongbox", "{message}");

    let mut guard = LOG.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = guard.as_mut() else {
        return;
    };

    if let Ok(pos) = state.file.stream_position() {
        if pos > MAX_LOG_SIZE {
            if let Ok(fresh) = File::create(&state.path) {
                state.file = fresh;
            }
        }
    }

    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let _ = writeln!(state.file, "{stamp} {message}");
    let _ = state.file.flush();
}

/// Reads back the whole log for the diagnostics upload.
pub fn debug_log_load() -> std::io::Result<Vec<u8>> {
    let guard = LOG.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = guard.as_ref() else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    File::open(&state.path)?.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        debug_log_init(dir.path()).unwrap();
        debug_log("hello from the test");

        let data = debug_log_load().unwrap();
        let text = String::from_utf8(data).unwrap();
        assert!(text.contains("hello from the test"));
    }
}
