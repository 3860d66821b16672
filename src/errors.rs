// SPDX-License-Identifier: GPL-3.0-only

//! Error types for segmented capture

use crate::backends::camera::types::{BackendError, CameraSelector};
use crate::recorder::state::{RecordingState, Trigger};
use std::fmt;
use std::time::Duration;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for orchestrator operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture orchestration errors
    Capture(CaptureError),
    /// Hardware collaborator errors
    Backend(BackendError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Failures raised while driving a recording
///
/// None of these reach the host as a thrown fault: the orchestrator logs them
/// and, for fatal ones, tears the attempt down and returns to Idle.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The device permit was not released within the bounded wait
    AcquisitionTimeout(Duration),
    /// The hardware refused or failed to open the camera
    DeviceOpenFailure(String),
    /// The open camera went away
    DeviceDisconnected,
    /// The open camera reported an error code after opening
    DeviceFault(i32),
    /// The capture session could not be configured
    SessionConfigFailed(String),
    /// The encoder could not be prepared or started
    EncoderStartFailure(String),
    /// The selected camera has no flash unit
    FlashUnsupported(CameraSelector),
    /// A command or callback arrived in a state that cannot honor it
    InvalidStateTransition {
        state: RecordingState,
        trigger: Trigger,
    },
    /// No usable preview target exists yet
    AwaitingSurface,
    /// Resubmitting the repeating request to a live session failed
    CaptureRequestFailed(String),
    /// The camera worker has shut down
    WorkerUnavailable,
    /// Segment file handling failed
    Storage(String),
}

impl CaptureError {
    /// Whether this failure ends the current attempt.
    ///
    /// Fatal errors trigger teardown and a transition to Idle; the others are
    /// rejections that leave the state machine where it was.
    pub fn is_fatal(&self) -> bool {
        match self {
            CaptureError::AcquisitionTimeout(_)
            | CaptureError::DeviceOpenFailure(_)
            | CaptureError::DeviceDisconnected
            | CaptureError::DeviceFault(_)
            | CaptureError::SessionConfigFailed(_)
            | CaptureError::EncoderStartFailure(_)
            | CaptureError::Storage(_) => true,
            CaptureError::FlashUnsupported(_)
            | CaptureError::InvalidStateTransition { .. }
            | CaptureError::AwaitingSurface
            | CaptureError::CaptureRequestFailed(_)
            | CaptureError::WorkerUnavailable => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Backend(e) => write!(f, "Backend error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::AcquisitionTimeout(waited) => write!(
                f,
                "Timed out after {}ms waiting to lock camera opening",
                waited.as_millis()
            ),
            CaptureError::DeviceOpenFailure(msg) => write!(f, "Failed to open camera: {}", msg),
            CaptureError::DeviceDisconnected => write!(f, "Camera disconnected"),
            CaptureError::DeviceFault(code) => write!(f, "Camera error: {}", code),
            CaptureError::SessionConfigFailed(msg) => {
                write!(f, "Capture session configuration failed: {}", msg)
            }
            CaptureError::EncoderStartFailure(msg) => {
                write!(f, "Failed to start encoder: {}", msg)
            }
            CaptureError::FlashUnsupported(camera) => {
                write!(f, "Flash not available for {} camera", camera)
            }
            CaptureError::InvalidStateTransition { state, trigger } => {
                write!(f, "Cannot handle {} while {}", trigger, state)
            }
            CaptureError::AwaitingSurface => write!(f, "Preview surface is not available"),
            CaptureError::CaptureRequestFailed(msg) => {
                write!(f, "Failed to update capture request: {}", msg)
            }
            CaptureError::WorkerUnavailable => write!(f, "Camera worker is not running"),
            CaptureError::Storage(msg) => write!(f, "Segment storage error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Storage(err.to_string())
    }
}
