//! Core request, outcome and event types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /pull-lfs` and `POST /status-lfs`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FetchRequest {
    /// Note the resources are embedded in (informational, used for logging)
    #[serde(default)]
    pub note: String,

    /// Resource paths relative to the working directory, in display order
    pub resources: Vec<String>,
}

impl FetchRequest {
    /// Create a request for the given resources
    pub fn new(note: impl Into<String>, resources: Vec<String>) -> Self {
        Self {
            note: note.into(),
            resources,
        }
    }
}

/// Per-resource result of a pull
///
/// Serialized as its integer code: `0` updated, `1` unchanged, `2` failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceOutcome {
    /// The tool succeeded and the file's modification time changed
    Updated,
    /// The tool succeeded and the file was already current
    Unchanged,
    /// The tool failed, or the file is missing afterwards
    Failed,
}

impl ResourceOutcome {
    /// Wire code for this outcome
    pub fn code(&self) -> u8 {
        match self {
            ResourceOutcome::Updated => 0,
            ResourceOutcome::Unchanged => 1,
            ResourceOutcome::Failed => 2,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ResourceOutcome::Updated),
            1 => Some(ResourceOutcome::Unchanged),
            2 => Some(ResourceOutcome::Failed),
            _ => None,
        }
    }
}

impl Serialize for ResourceOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ResourceOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        ResourceOutcome::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown outcome code {code}")))
    }
}

/// What a resource looks like in the working tree right now
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceState {
    /// Only the LFS pointer is present; content has not been pulled
    PointerFile,
    /// Real content is present
    LocalFile,
    /// Nothing exists at that path
    Missing,
}

/// Event emitted while serving pull requests
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batched pull started
    FetchStarted {
        /// Note the request came from
        note: String,
        /// Number of resources in the batch
        resources: usize,
    },

    /// A batched pull finished and was classified
    FetchCompleted {
        /// Note the request came from
        note: String,
        /// Exit code of the pull tool
        exit_code: i32,
        /// Resources whose content changed
        updated: usize,
        /// Resources that failed
        failed: usize,
    },

    /// The client went away before the pull finished; the tool was terminated
    ClientAbandoned {
        /// Note the request came from
        note: String,
    },

    /// A request replaced the legacy work queue
    BatchQueued {
        /// Generation of the new queue
        generation: u64,
        /// Number of entries queued
        queued: usize,
    },

    /// The worker switched queues, dropping unread entries of the old one
    BatchSuperseded {
        /// Generation the worker was draining
        from: u64,
        /// Generation it switched to
        to: u64,
        /// Entries of the old queue that will never be pulled
        abandoned: usize,
    },

    /// The legacy worker pulled one resource
    ResourcePulled {
        /// Generation the entry belonged to
        generation: u64,
        /// Resource path
        resource: String,
        /// Whether the tool exited successfully
        success: bool,
    },
}
