//! Per-process log files.
//!
//! Helper processes (the speech server) write a lot of output that does not
//! belong in the application log. Each one gets its own append-only file.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Shared handle to an append-only log file. `None` when logging is disabled.
pub type LogHandle = Arc<Mutex<Option<File>>>;

fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Append a timestamped line to the log file, if one is open.
pub fn log_line(handle: &LogHandle, stream: &str, data: &str) {
    let Ok(mut guard) = handle.lock() else {
        return;
    };
    if let Some(file) = guard.as_mut() {
        let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), stream, data);
        let _ = file.flush();
    }
}

/// Open (or create) `{log_dir}/{log_id}.log`.
///
/// Failure to create the directory or file yields a disabled handle.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{log_id}.log")))
            .ok()
    });
    Arc::new(Mutex::new(file))
}
