//! Login-shell command building for helper processes.
//!
//! Helper programs (the speech server, the audio player) are usually installed
//! through pyenv, Homebrew or similar, so they are only on PATH inside the
//! user's login shell. Commands are therefore wrapped as
//! `<shell> -l -c '<quoted command>'` on Unix.

use std::path::Path;
use std::process::Command;

/// Exit status reported when a helper process terminates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProcessExit {
    pub code: i32,
    pub signal: Option<i32>,
}

/// Shells that do not understand `-l -c`.
const NON_POSIX_SHELLS: [&str; 6] = ["fish", "nu", "nushell", "elvish", "xonsh", "ion"];

/// Prepend the program's directory to PATH when it is given as a path.
fn prepend_program_dir(cmd: &mut Command, program: &str) {
    if !program.contains('/') {
        return;
    }
    let Some(dir) = Path::new(program).parent().and_then(|d| d.to_str()) else {
        return;
    };
    let existing = std::env::var("PATH").unwrap_or_default();
    let combined = if existing.is_empty() {
        dir.to_string()
    } else {
        format!("{dir}:{existing}")
    };
    cmd.env("PATH", combined);
}

/// Build a command running `program args...` inside a login shell.
///
/// `shell_prefix` overrides the default `$SHELL -l -c` (e.g. `/bin/bash -c`).
#[cfg(unix)]
pub fn build_login_shell_command(
    program: &str,
    args: &[String],
    shell_prefix: Option<&str>,
) -> Result<Command, String> {
    let prefix = shell_prefix_or_default(shell_prefix);
    let mut parts = prefix.split_whitespace();
    let shell = parts.next().ok_or_else(|| "Empty shell prefix".to_string())?;
    let shell_args: Vec<&str> = parts.collect();

    let mut quoted = Vec::with_capacity(args.len() + 1);
    quoted.push(
        shlex::try_quote(program)
            .map_err(|_| format!("Invalid program path: {program}"))?
            .into_owned(),
    );
    for arg in args {
        quoted.push(
            shlex::try_quote(arg)
                .map_err(|_| format!("Invalid argument: {arg}"))?
                .into_owned(),
        );
    }

    let mut cmd = Command::new(shell);
    cmd.args(shell_args).arg(quoted.join(" "));
    prepend_program_dir(&mut cmd, program);
    Ok(cmd)
}

#[cfg(unix)]
fn shell_prefix_or_default(custom: Option<&str>) -> String {
    if let Some(prefix) = custom.filter(|p| !p.trim().is_empty()) {
        return prefix.to_string();
    }

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let name = Path::new(&shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let effective = if NON_POSIX_SHELLS.contains(&name) {
        if Path::new("/bin/bash").exists() {
            "/bin/bash".to_string()
        } else {
            "/bin/sh".to_string()
        }
    } else {
        shell
    };

    format!("{effective} -l -c")
}

/// Windows has no login shell; run the program directly.
#[cfg(windows)]
pub fn build_login_shell_command(
    program: &str,
    args: &[String],
    _shell_prefix: Option<&str>,
) -> Result<Command, String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    prepend_program_dir(&mut cmd, program);
    Ok(cmd)
}

/// Look up an executable on PATH.
pub fn find_on_path(program: &str) -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
