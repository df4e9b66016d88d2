//! Pull tool execution
//!
//! [`FetchExecutor`] turns a set of resources into exactly one invocation of
//! `<command> pull --include <a,b,c>` inside the working tree. The running
//! invocation is a [`FetchOperation`]: it can be polled with a bounded wait so
//! callers can interleave other checks, and terminated so that no process
//! outlives a cancelled request.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::Config;
use crate::error::{Error, Result};

/// Program used to simulate the pull in dry-run mode
const DRY_RUN_PROGRAM: &str = "echo";

/// Exit code reported for a process that was ended by a signal
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// Lifecycle of a [`FetchOperation`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    /// The tool is still running
    Running,
    /// The tool exited on its own with this code
    Completed(i32),
    /// The tool was terminated by us and has been reaped
    Terminated,
}

/// Builds and starts pull tool invocations
#[derive(Clone, Debug)]
pub struct FetchExecutor {
    working_dir: PathBuf,
    command: Vec<String>,
    dry_run: bool,
    terminate_grace: Duration,
}

impl FetchExecutor {
    /// Create an executor from the daemon configuration
    pub fn new(config: &Config) -> Self {
        Self {
            working_dir: config.working_dir.clone(),
            command: config.lfs.command.clone(),
            dry_run: config.dry_run,
            terminate_grace: config.lfs.terminate_grace,
        }
    }

    /// Whether commands are echoed instead of executed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Resolve the program that will actually be executed
    ///
    /// Uses the `which` crate so a missing `git` is reported at startup
    /// rather than on the first request.
    pub fn resolve_program(&self) -> Result<PathBuf> {
        let program = if self.dry_run {
            DRY_RUN_PROGRAM
        } else {
            self.command.first().map(String::as_str).ok_or_else(|| Error::Config {
                message: "pull command must name a program".to_string(),
                key: Some("lfs.command".to_string()),
            })?
        };

        which::which(program).map_err(|e| Error::Config {
            message: format!("{program} not found: {e}"),
            key: Some("lfs.command".to_string()),
        })
    }

    /// Full argv for pulling `resources`, including the dry-run prefix
    pub fn command_line(&self, resources: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.command.len() + 4);
        if self.dry_run {
            argv.push(DRY_RUN_PROGRAM.to_string());
        }
        argv.extend(self.command.iter().cloned());
        argv.push("pull".to_string());
        argv.push("--include".to_string());
        argv.push(resources.join(","));
        argv
    }

    /// Start one pull for the whole resource set
    pub fn start(&self, resources: &[String]) -> Result<FetchOperation> {
        let argv = self.command_line(resources);
        let (program, args) = argv.split_first().ok_or_else(|| Error::Config {
            message: "pull command must name a program".to_string(),
            key: Some("lfs.command".to_string()),
        })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Own process group so termination reaches the helpers git spawns.
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;

        tracing::debug!(
            pid = child.id(),
            command = %argv.join(" "),
            "started pull tool"
        );

        Ok(FetchOperation {
            resources: resources.to_vec(),
            child,
            state: OperationState::Running,
            terminate_grace: self.terminate_grace,
        })
    }
}

/// One running invocation of the pull tool
///
/// Owned by whoever started it. Dropping a running operation kills its whole
/// process group; call [`terminate`](Self::terminate) to also wait for it.
#[derive(Debug)]
pub struct FetchOperation {
    resources: Vec<String>,
    child: Child,
    state: OperationState,
    terminate_grace: Duration,
}

impl FetchOperation {
    /// Resources this invocation pulls
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// OS process id, `None` once the process has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Current state
    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Wait at most `interval` for the tool to finish
    ///
    /// Returns `Some(exit_code)` once the process has exited and `None` if it
    /// is still running after `interval`.
    pub async fn poll_exit(&mut self, interval: Duration) -> Result<Option<i32>> {
        match self.state {
            OperationState::Completed(code) => return Ok(Some(code)),
            OperationState::Terminated => return Ok(Some(SIGNALLED_EXIT_CODE)),
            OperationState::Running => {}
        }

        match tokio::time::timeout(interval, self.child.wait()).await {
            Ok(status) => {
                let code = exit_code(status?);
                self.state = OperationState::Completed(code);
                Ok(Some(code))
            }
            Err(_) => Ok(None),
        }
    }

    /// Wait for the tool to finish, however long it takes
    pub async fn wait(&mut self) -> Result<i32> {
        match self.state {
            OperationState::Completed(code) => Ok(code),
            OperationState::Terminated => Ok(SIGNALLED_EXIT_CODE),
            OperationState::Running => {
                let code = exit_code(self.child.wait().await?);
                self.state = OperationState::Completed(code);
                Ok(code)
            }
        }
    }

    /// Terminate the tool and wait for it to exit
    ///
    /// Sends SIGTERM to the process group, gives it the configured grace
    /// period, then kills it. Returns only after the process was reaped.
    pub async fn terminate(&mut self) -> Result<()> {
        if self.state != OperationState::Running {
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            signal_group(pid, libc::SIGTERM);
        }

        match tokio::time::timeout(self.terminate_grace, self.child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                tracing::warn!(
                    pid = self.child.id(),
                    grace = ?self.terminate_grace,
                    "pull tool ignored SIGTERM, killing"
                );
                #[cfg(unix)]
                if let Some(pid) = self.child.id() {
                    signal_group(pid, libc::SIGKILL);
                }
                self.child.kill().await?;
            }
        }

        self.state = OperationState::Terminated;
        Ok(())
    }
}

impl Drop for FetchOperation {
    fn drop(&mut self) {
        if self.state != OperationState::Running {
            return;
        }
        // kill_on_drop only reaches the direct child.
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            tracing::debug!(pid, "dropping running pull tool, killing its process group");
            signal_group(pid, libc::SIGKILL);
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALLED_EXIT_CODE)
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a stale group id
    // only yields ESRCH.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        tracing::debug!(
            pid,
            signal,
            error = %std::io::Error::last_os_error(),
            "failed to signal pull tool process group"
        );
    }
}
