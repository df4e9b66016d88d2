//! Per-resource outcome classification
//!
//! Modification times are captured right before the pull starts and compared
//! once it has finished. The tool's exit code applies to the batch as a whole:
//! a nonzero exit fails every resource, because the failure cannot be
//! attributed to one of them.

use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use crate::types::{ResourceOutcome, ResourceState};

/// First line of every Git LFS pointer file
const LFS_POINTER_HEADER: &[u8] = b"version https://git-lfs.github.com/spec/v1";

/// Pointer files are tiny; anything larger holds real content
const MAX_POINTER_SIZE: u64 = 1024;

/// Modification time of one resource, taken before the pull
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSnapshot {
    /// Resource path relative to the working directory
    pub resource: String,
    /// `None` when the file did not exist (or could not be stat'ed)
    pub modified: Option<SystemTime>,
}

/// Capture modification times for every resource, in request order
pub fn snapshot(working_dir: &Path, resources: &[String]) -> Vec<ResourceSnapshot> {
    resources
        .iter()
        .map(|resource| ResourceSnapshot {
            resource: resource.clone(),
            modified: modified_time(&working_dir.join(resource)),
        })
        .collect()
}

/// Classify every snapshotted resource after the pull exited with `exit_code`
///
/// The result has one entry per snapshot, in the same order.
pub fn classify(
    working_dir: &Path,
    exit_code: i32,
    snapshots: &[ResourceSnapshot],
) -> Vec<ResourceOutcome> {
    if exit_code != 0 {
        return vec![ResourceOutcome::Failed; snapshots.len()];
    }

    snapshots
        .iter()
        .map(|snap| {
            let path = working_dir.join(&snap.resource);
            match modified_time(&path) {
                None => {
                    tracing::warn!(
                        resource = %snap.resource,
                        "resource missing after successful pull"
                    );
                    ResourceOutcome::Failed
                }
                Some(after) if Some(after) == snap.modified => ResourceOutcome::Unchanged,
                Some(_) => ResourceOutcome::Updated,
            }
        })
        .collect()
}

/// Describe what is currently on disk for `resource`
pub fn resource_status(working_dir: &Path, resource: &str) -> ResourceState {
    let path = working_dir.join(resource);
    let Ok(metadata) = std::fs::metadata(&path) else {
        return ResourceState::Missing;
    };

    if metadata.is_file() && metadata.len() <= MAX_POINTER_SIZE && is_pointer(&path) {
        ResourceState::PointerFile
    } else {
        ResourceState::LocalFile
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn is_pointer(path: &Path) -> bool {
    let mut header = [0u8; LFS_POINTER_HEADER.len()];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map(|()| header == LFS_POINTER_HEADER)
        .unwrap_or(false)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const POINTER: &str = "version https://git-lfs.github.com/spec/v1\n\
        oid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393\n\
        size 12345\n";

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    fn resources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nonzero_exit_fails_every_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"a").unwrap();
        let snaps = snapshot(dir.path(), &resources(&["a.png", "missing.png"]));

        let outcomes = classify(dir.path(), 1, &snaps);
        assert_eq!(outcomes, vec![ResourceOutcome::Failed, ResourceOutcome::Failed]);
    }

    #[test]
    fn changed_mtime_is_updated_and_same_mtime_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, POINTER).unwrap();
        std::fs::write(&b, b"already here").unwrap();

        let before = SystemTime::now() - Duration::from_secs(3600);
        set_mtime(&a, before);
        set_mtime(&b, before);

        let snaps = snapshot(dir.path(), &resources(&["a.png", "b.png"]));
        std::fs::write(&a, b"real content").unwrap();
        set_mtime(&a, before + Duration::from_secs(60));

        let outcomes = classify(dir.path(), 0, &snaps);
        assert_eq!(
            outcomes,
            vec![ResourceOutcome::Updated, ResourceOutcome::Unchanged]
        );
    }

    #[test]
    fn file_created_by_pull_is_updated() {
        let dir = tempfile::tempdir().unwrap();
        let snaps = snapshot(dir.path(), &resources(&["new.png"]));
        assert_eq!(snaps[0].modified, None);

        std::fs::write(dir.path().join("new.png"), b"content").unwrap();
        assert_eq!(
            classify(dir.path(), 0, &snaps),
            vec![ResourceOutcome::Updated]
        );
    }

    #[test]
    fn missing_after_success_fails_only_that_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("here.png"), b"x").unwrap();
        let snaps = snapshot(dir.path(), &resources(&["gone.png", "here.png"]));

        assert_eq!(
            classify(dir.path(), 0, &snaps),
            vec![ResourceOutcome::Failed, ResourceOutcome::Unchanged]
        );
    }

    #[test]
    fn status_distinguishes_pointer_local_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pointer.png"), POINTER).unwrap();
        std::fs::write(dir.path().join("local.png"), vec![0u8; 4096]).unwrap();

        assert_eq!(
            resource_status(dir.path(), "pointer.png"),
            ResourceState::PointerFile
        );
        assert_eq!(
            resource_status(dir.path(), "local.png"),
            ResourceState::LocalFile
        );
        assert_eq!(
            resource_status(dir.path(), "nope.png"),
            ResourceState::Missing
        );
    }

    #[test]
    fn short_text_file_is_not_a_pointer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), b"hello").unwrap();
        assert_eq!(
            resource_status(dir.path(), "note.txt"),
            ResourceState::LocalFile
        );
    }
}
