// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the camera hardware abstraction

//! Shared types for camera backends

use super::{CameraDeviceHandle, CaptureSessionHandle};
use crate::flash::FlashMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which physical camera is selected
///
/// Only two cameras are supported; toggling flips between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSelector {
    /// Main (usually back-facing) camera
    #[default]
    Primary,
    /// Secondary (usually front-facing) camera
    Secondary,
}

impl CameraSelector {
    /// The other camera
    pub fn toggled(self) -> Self {
        match self {
            CameraSelector::Primary => CameraSelector::Secondary,
            CameraSelector::Secondary => CameraSelector::Primary,
        }
    }

    /// Hardware camera identifier used by camera managers
    pub fn hardware_id(self) -> &'static str {
        match self {
            CameraSelector::Primary => "0",
            CameraSelector::Secondary => "1",
        }
    }
}

impl std::fmt::Display for CameraSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSelector::Primary => write!(f, "primary"),
            CameraSelector::Secondary => write!(f, "secondary"),
        }
    }
}

/// Fixed characteristics of a physical camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCharacteristics {
    /// Clockwise angle (degrees) the sensor image must be rotated to be upright
    pub sensor_orientation: i32,
    /// Whether a flash unit is available for torch mode
    pub has_flash: bool,
}

impl CameraCharacteristics {
    /// Orientation tag stored with a segment recorded on this camera.
    ///
    /// The sensor orientation as reported. No device-rotation compensation
    /// happens here; players apply the tag.
    pub fn orientation_hint(&self) -> i32 {
        self.sensor_orientation
    }
}

/// Kind of drawable target a surface belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// Live preview rendered by the UI layer
    Preview,
    /// Input surface of an encoder sink
    Encoder,
}

/// Identifier of a drawable target, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// A sized target surface that a capture session can stream frames into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Surface {
    pub id: SurfaceId,
    pub kind: SurfaceKind,
    pub width: u32,
    pub height: u32,
}

impl Surface {
    /// Allocate a new surface with a fresh identifier
    pub fn new(kind: SurfaceKind, width: u32, height: u32) -> Self {
        Self {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            kind,
            width,
            height,
        }
    }

    /// Preview surface of the given size
    pub fn preview(width: u32, height: u32) -> Self {
        Self::new(SurfaceKind::Preview, width, height)
    }

    /// Encoder input surface of the given size
    pub fn encoder(width: u32, height: u32) -> Self {
        Self::new(SurfaceKind::Encoder, width, height)
    }

    /// A session can only be created on a live, sized target
    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Request template, mirroring camera manager templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureTemplate {
    Record,
}

/// Standing instruction for a session: stream to these targets with these settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub template: CaptureTemplate,
    pub targets: Vec<Surface>,
    pub flash_mode: FlashMode,
}

/// Builder returned by [`CameraDeviceHandle::create_capture_request`]
#[derive(Debug, Clone)]
pub struct CaptureRequestBuilder {
    template: CaptureTemplate,
    targets: Vec<Surface>,
    flash_mode: FlashMode,
}

impl CaptureRequestBuilder {
    pub fn new(template: CaptureTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
            flash_mode: FlashMode::Off,
        }
    }

    /// Add an output target; duplicates are ignored
    pub fn add_target(mut self, surface: Surface) -> Self {
        if !self.targets.iter().any(|s| s.id == surface.id) {
            self.targets.push(surface);
        }
        self
    }

    pub fn flash_mode(mut self, mode: FlashMode) -> Self {
        self.flash_mode = mode;
        self
    }

    pub fn build(self) -> CaptureRequest {
        CaptureRequest {
            template: self.template,
            targets: self.targets,
            flash_mode: self.flash_mode,
        }
    }
}

/// One contiguous open-camera interval; tags every hardware callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeId(pub u64);

impl EpisodeId {
    pub fn next(self) -> Self {
        EpisodeId(self.0 + 1)
    }
}

impl std::fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Asynchronous callbacks from the camera hardware
pub enum HardwareEvent {
    /// Camera opened; ownership of the device handle moves to the receiver
    DeviceOpened {
        episode: EpisodeId,
        device: Box<dyn CameraDeviceHandle>,
    },
    /// Camera reported an error (before or after opening)
    DeviceError { episode: EpisodeId, code: i32 },
    /// Camera was disconnected
    DeviceDisconnected { episode: EpisodeId },
    /// Capture session ready; ownership of the session handle moves to the receiver
    SessionConfigured {
        episode: EpisodeId,
        session: Box<dyn CaptureSessionHandle>,
    },
    /// Capture session could not be created
    SessionConfigureFailed { episode: EpisodeId },
}

impl HardwareEvent {
    pub fn episode(&self) -> EpisodeId {
        match self {
            HardwareEvent::DeviceOpened { episode, .. }
            | HardwareEvent::DeviceError { episode, .. }
            | HardwareEvent::DeviceDisconnected { episode }
            | HardwareEvent::SessionConfigured { episode, .. }
            | HardwareEvent::SessionConfigureFailed { episode } => *episode,
        }
    }
}

impl std::fmt::Debug for HardwareEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HardwareEvent::DeviceOpened { episode, device } => f
                .debug_struct("DeviceOpened")
                .field("episode", episode)
                .field("camera", &device.selector())
                .finish(),
            HardwareEvent::DeviceError { episode, code } => f
                .debug_struct("DeviceError")
                .field("episode", episode)
                .field("code", code)
                .finish(),
            HardwareEvent::DeviceDisconnected { episode } => f
                .debug_struct("DeviceDisconnected")
                .field("episode", episode)
                .finish(),
            HardwareEvent::SessionConfigured { episode, .. } => f
                .debug_struct("SessionConfigured")
                .field("episode", episode)
                .finish(),
            HardwareEvent::SessionConfigureFailed { episode } => f
                .debug_struct("SessionConfigureFailed")
                .field("episode", episode)
                .finish(),
        }
    }
}

/// Where the hardware posts its callbacks
///
/// The sink marshals events onto the orchestrator's worker; hardware never
/// touches orchestrator state directly.
#[derive(Clone)]
pub struct HardwareEventSink {
    post: Arc<dyn Fn(HardwareEvent) -> bool + Send + Sync>,
}

impl HardwareEventSink {
    pub fn new(post: impl Fn(HardwareEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            post: Arc::new(post),
        }
    }

    /// Deliver an event. Returns false when the receiver is gone.
    pub fn post(&self, event: HardwareEvent) -> bool {
        (self.post)(event)
    }
}

impl std::fmt::Debug for HardwareEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareEventSink").finish_non_exhaustive()
    }
}

/// Backend error types
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Camera device not found
    DeviceNotFound(String),
    /// Camera is busy or in use elsewhere
    Busy,
    /// Operation on a handle that was already closed
    Closed(String),
    /// Invalid surface or request
    InvalidTarget(String),
    /// Encoder lifecycle misuse or failure
    Encoder(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Busy => write!(f, "Camera is busy"),
            BackendError::Closed(msg) => write!(f, "Handle closed: {}", msg),
            BackendError::InvalidTarget(msg) => write!(f, "Invalid target: {}", msg),
            BackendError::Encoder(msg) => write!(f, "Encoder error: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
