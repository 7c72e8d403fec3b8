//! Helper process spawning and output capture.
//!
//! Long-running helpers (the speech synthesis server) are started in the
//! user's login shell. Their stdout/stderr are read on background threads and
//! delivered as [`ProcessEvent`]s over a channel; a watcher thread reports the
//! exit status.

use crate::shell::{build_login_shell_command, ProcessExit};
use std::io::{BufRead, BufReader};
use std::process::{Child, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const GRACEFUL_STOP_ATTEMPTS: u32 = 30;

/// Output and lifecycle events from a helper process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Exit(ProcessExit),
}

/// What to run and how.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Shell prefix override, e.g. `/bin/zsh -l -c`.
    pub shell_prefix: Option<String>,
}

impl SpawnConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            shell_prefix: None,
        }
    }

    pub fn shell_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shell_prefix = Some(prefix.into());
        self
    }
}

/// A running helper process.
pub struct HelperProcess {
    child: Arc<Mutex<Option<Child>>>,
    events: Mutex<Option<Receiver<ProcessEvent>>>,
}

impl HelperProcess {
    /// Spawn the process and start the reader and exit-watcher threads.
    pub fn spawn(config: SpawnConfig) -> Result<Self, String> {
        let mut cmd = build_login_shell_command(
            &config.program,
            &config.args,
            config.shell_prefix.as_deref(),
        )?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("Failed to spawn {}: {e}", config.program))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "Failed to capture stdout".to_string())?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| "Failed to capture stderr".to_string())?;

        let (tx, rx) = mpsc::channel();

        let tx_out = tx.clone();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if tx_out.send(ProcessEvent::Stdout(line)).is_err() {
                    break;
                }
            }
        });

        let tx_err = tx.clone();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if tx_err.send(ProcessEvent::Stderr(line)).is_err() {
                    break;
                }
            }
        });

        let child = Arc::new(Mutex::new(Some(child)));
        let watched = Arc::clone(&child);
        thread::spawn(move || loop {
            {
                let Ok(mut guard) = watched.lock() else {
                    break;
                };
                let Some(running) = guard.as_mut() else {
                    break;
                };
                match running.try_wait() {
                    Ok(Some(status)) => {
                        let _ = tx.send(ProcessEvent::Exit(exit_from_status(status)));
                        guard.take();
                        break;
                    }
                    Ok(None) => {}
                    Err(_) => {
                        guard.take();
                        break;
                    }
                }
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        });

        Ok(Self {
            child,
            events: Mutex::new(Some(rx)),
        })
    }

    /// Take the event receiver so it can be drained on another thread.
    ///
    /// Returns `None` after the first call.
    pub fn take_events(&self) -> Option<Receiver<ProcessEvent>> {
        self.events.lock().ok().and_then(|mut events| events.take())
    }

    pub fn is_running(&self) -> bool {
        self.child.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Ask the process to exit (SIGINT on Unix), force-killing after 3s.
    pub fn stop(&self) {
        let Ok(mut guard) = self.child.lock() else {
            return;
        };
        let Some(child) = guard.as_mut() else {
            return;
        };

        #[cfg(unix)]
        {
            // SAFETY: signalling a child pid we own; no memory is touched.
            unsafe {
                libc::kill(child.id() as i32, libc::SIGINT);
            }
            for _ in 0..GRACEFUL_STOP_ATTEMPTS {
                thread::sleep(EXIT_POLL_INTERVAL);
                match child.try_wait() {
                    Ok(Some(_)) => {
                        guard.take();
                        return;
                    }
                    Ok(None) => continue,
                    Err(_) => break,
                }
            }
        }

        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Kill the process immediately.
    pub fn kill(&self) {
        if let Ok(mut guard) = self.child.lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

fn exit_from_status(status: std::process::ExitStatus) -> ProcessExit {
    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(&status);
    #[cfg(not(unix))]
    let signal = None;

    ProcessExit {
        code: status.code().unwrap_or(-1),
        signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_config_builder() {
        let config = SpawnConfig::new("chatterbox-server", vec!["--port".to_string()])
            .shell_prefix("/bin/bash -c");
        assert_eq!(config.program, "chatterbox-server");
        assert_eq!(config.args, vec!["--port"]);
        assert_eq!(config.shell_prefix.as_deref(), Some("/bin/bash -c"));
    }

    #[test]
    #[cfg(unix)]
    fn echo_output_then_exit() {
        let config =
            SpawnConfig::new("echo", vec!["ready".to_string()]).shell_prefix("/bin/sh -c");
        let process = HelperProcess::spawn(config).unwrap();
        let events = process.take_events().unwrap();
        assert!(process.take_events().is_none());

        let mut saw_line = false;
        let mut exit = None;
        while let Ok(event) = events.recv_timeout(Duration::from_secs(5)) {
            match event {
                ProcessEvent::Stdout(line) if line == "ready" => saw_line = true,
                ProcessEvent::Exit(status) => exit = Some(status),
                _ => {}
            }
        }

        assert!(saw_line);
        assert_eq!(exit.map(|e| e.code), Some(0));
    }

    #[test]
    fn helper_process_can_be_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HelperProcess>();
    }

    #[test]
    #[cfg(unix)]
    fn kill_stops_long_running_process() {
        let config =
            SpawnConfig::new("sleep", vec!["30".to_string()]).shell_prefix("/bin/sh -c");
        let process = HelperProcess::spawn(config).unwrap();
        assert!(process.is_running());
        process.kill();
        assert!(!process.is_running());
    }
}
