//! Shared fixtures for tests that run a fake pull tool

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use crate::config::{Config, DispatchMode};

/// Write `body` as an executable `sh` script and return a config that runs it
///
/// The script receives `pull --include <list>` as `$1..$3` and runs inside
/// `dir`, which is also the working directory.
pub(crate) fn fake_tool_config(dir: &Path, body: &str) -> Config {
    let tool = dir.join("fake-lfs");
    std::fs::write(&tool, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = Config {
        working_dir: dir.to_path_buf(),
        ..Default::default()
    };
    config.lfs.command = vec![tool.to_string_lossy().into_owned()];
    config.lfs.poll_interval = Duration::from_millis(20);
    config.lfs.terminate_grace = Duration::from_millis(500);
    config
}

/// Same as [`fake_tool_config`], in queued mode
pub(crate) fn queued_tool_config(dir: &Path, body: &str) -> Config {
    Config {
        mode: DispatchMode::Queued,
        ..fake_tool_config(dir, body)
    }
}
