// src/exec/command.rs

//! Shell command construction and signal helpers.

use std::path::Path;

use tokio::process::{Child, Command};
use tracing::debug;

/// Build a shell command appropriate for the platform, running in `cwd`.
pub fn shell_command(cmdline: &str, cwd: &Path) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmdline);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmdline);
        c
    };
    cmd.current_dir(cwd);
    cmd
}

/// Shell command for the long-running child.
///
/// A simple command (one program with arguments) is prefixed with `exec` on
/// unix, so the shell replaces itself and signals reach the program rather
/// than a wrapper `sh`.
pub fn child_command(cmdline: &str, cwd: &Path) -> Command {
    if cfg!(unix) && is_simple_command(cmdline) {
        shell_command(&format!("exec {}", cmdline.trim()), cwd)
    } else {
        shell_command(cmdline, cwd)
    }
}

/// True if `cmdline` is a single external command that `exec` can replace
/// the shell with: no lists, pipes, subshells or redirections, no leading
/// variable assignment, and not a shell builtin or keyword.
pub fn is_simple_command(cmdline: &str) -> bool {
    const OPERATORS: &[char] = &[';', '&', '|', '\n', '(', ')', '{', '}', '<', '>', '`'];
    const BUILTINS: &[&str] = &[
        "!", ".", ":", "alias", "case", "cd", "eval", "exec", "exit", "export", "for", "if",
        "readonly", "return", "set", "shift", "source", "trap", "ulimit", "umask", "unset",
        "until", "wait", "while",
    ];

    let cmdline = cmdline.trim();
    if cmdline.contains(OPERATORS) {
        return false;
    }
    match cmdline.split_whitespace().next() {
        Some(program) => !program.contains('=') && !BUILTINS.contains(&program),
        None => false,
    }
}

/// Put the command into a new process group so the whole tree can be
/// signalled at once. No-op on non-unix platforms.
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// SIGKILL the process group led by `child` (unix), then kill and reap the
/// child itself.
pub async fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            if let Err(e) = signal_group(pid, nix::sys::signal::Signal::SIGKILL) {
                debug!(pid, error = %e, "failed to signal process group");
            }
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to kill process");
    }
}

#[cfg(unix)]
pub use unix::{signal_group, signal_process};

#[cfg(unix)]
mod unix {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    /// Send `signal` to the process group led by `pid`.
    pub fn signal_group(pid: u32, signal: Signal) -> std::io::Result<()> {
        killpg(to_pid(pid), signal).map_err(std::io::Error::from)
    }

    /// Send `signal` to the single process `pid`.
    pub fn signal_process(pid: u32, signal: Signal) -> std::io::Result<()> {
        kill(to_pid(pid), signal).map_err(std::io::Error::from)
    }

    fn to_pid(pid: u32) -> Pid {
        Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX))
    }
}
