use std::path::PathBuf;

use thiserror::Error;

use crate::media::types::PlaybackState;

/// Failures reported by a resource loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("no resources to load")]
    Empty,
    #[error("resource not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
    #[error("loader worker exited before reporting")]
    WorkerGone,
    #[error("{0}")]
    Other(String),
}

/// Failures reported by a frame decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("decoder has not been opened")]
    NotOpen,
    #[error("frame {index} out of range (decoder has {num_frames} frames)")]
    OutOfRange { index: usize, num_frames: usize },
    #[error("unsupported or corrupt resource: {0}")]
    Format(String),
    #[error("frame {index} failed to decode: {reason}")]
    Frame { index: usize, reason: String },
}

/// Errors returned by the public `Media` operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("`{op}` is not permitted while {state}")]
    InvalidTransition {
        op: &'static str,
        state: PlaybackState,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Frame numbers run from 1 to `num_frames`.
    #[error("frame {frame} out of range (expected 1..={num_frames})")]
    FrameOutOfRange { frame: usize, num_frames: usize },
    #[error("no {0} attached")]
    MissingCollaborator(&'static str),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl EngineError {
    pub(crate) fn invalid(op: &'static str, state: PlaybackState) -> Self {
        Self::InvalidTransition { op, state }
    }
}
